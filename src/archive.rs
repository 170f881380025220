use std::path::Path;

use tracing::info;

use crate::config::ArchiveConfig;
use crate::domain::{Criteria, DataLevel, Position, TableFormat};
use crate::download::{self, DownloadClient, DownloadHttpClient, DownloadOptions, DownloadSummary};
use crate::error::NeidError;
use crate::lookup::{LookupHttpClient, NameResolver};
use crate::query;
use crate::session::Session;
use crate::tap::{TapClient, TapHttpClient, TapRequest};

/// Cone radius used when an object name is resolved into a position search.
pub const DEFAULT_OBJECT_RADIUS_DEG: f64 = 0.5;

/// Per-call output options. The default requests an IPAC table with no
/// record cap.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub format: TableFormat,
    pub maxrec: Option<u32>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            format: TableFormat::Ipac,
            maxrec: None,
        }
    }
}

/// Entry point for archive access, generic over the three remote services
/// so tests can substitute fakes. Every query method validates its input
/// locally, builds one ADQL statement, and runs a single synchronous TAP
/// exchange that writes the result table to `outpath`. Passing
/// `session: None` scopes the call to public data.
pub struct Archive<T: TapClient, L: NameResolver, D: DownloadClient> {
    tap: T,
    resolver: L,
    files: D,
}

impl Archive<TapHttpClient, LookupHttpClient, DownloadHttpClient> {
    /// Wire up the HTTP clients against a configured archive.
    pub fn connect(config: &ArchiveConfig) -> Result<Self, NeidError> {
        Ok(Self::new(
            TapHttpClient::new(config)?,
            LookupHttpClient::new(config)?,
            DownloadHttpClient::new(config)?,
        ))
    }
}

impl<T: TapClient, L: NameResolver, D: DownloadClient> Archive<T, L, D> {
    pub fn new(tap: T, resolver: L, files: D) -> Self {
        Self {
            tap,
            resolver,
            files,
        }
    }

    /// Run a caller-supplied ADQL statement verbatim. No client-side
    /// validation beyond non-emptiness; a malformed statement surfaces as
    /// the server's error.
    pub fn query_adql(
        &self,
        adql: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        if adql.trim().is_empty() {
            return Err(NeidError::EmptyParameter("query"));
        }
        self.run(adql.to_string(), session, options, outpath)
    }

    /// Search by observation-time range, `datetime1/datetime2` with either
    /// side optional.
    pub fn query_datetime(
        &self,
        datalevel: DataLevel,
        datetime: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut criteria = Criteria::new(datalevel);
        criteria.datetime = Some(datetime.parse()?);
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Search by sky region: `circle ra dec radius`,
    /// `box ra dec width height`, or `polygon ra1 dec1 ra2 dec2 ...`.
    pub fn query_position(
        &self,
        datalevel: DataLevel,
        position: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut criteria = Criteria::new(datalevel);
        criteria.position = Some(position.parse()?);
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Search around a named target. The name goes to the lookup service
    /// unmodified; its coordinates become a cone search of `radius` degrees
    /// (0.5 when unspecified).
    pub fn query_object(
        &self,
        datalevel: DataLevel,
        object: &str,
        radius: Option<f64>,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        if object.trim().is_empty() {
            return Err(NeidError::EmptyParameter("object"));
        }
        let coords = self.resolver.resolve(object)?;
        info!(object, ra = coords.ra, dec = coords.dec, "object name resolved");

        let mut criteria = Criteria::new(datalevel);
        criteria.position = Some(Position::Circle {
            ra: coords.ra,
            dec: coords.dec,
            radius: radius.unwrap_or(DEFAULT_OBJECT_RADIUS_DEG),
        });
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Search by the target name recorded in the archive's own catalog; the
    /// match happens in the database, no name resolution is involved.
    pub fn query_qobject(
        &self,
        datalevel: DataLevel,
        qobject: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut criteria = Criteria::new(datalevel);
        criteria.qobject = Some(qobject.to_string());
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Search by program ID.
    pub fn query_program(
        &self,
        datalevel: DataLevel,
        program: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut criteria = Criteria::new(datalevel);
        criteria.program = Some(program.to_string());
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Search by PI name as recorded in the program catalog.
    pub fn query_piname(
        &self,
        datalevel: DataLevel,
        piname: &str,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut criteria = Criteria::new(datalevel);
        criteria.piname = Some(piname.to_string());
        self.query_criteria(&criteria, session, options, outpath)
    }

    /// Combine any set of predicates into one conjunctive request. An
    /// `object` criterion is resolved here and folded into a cone position
    /// before the statement is built.
    pub fn query_criteria(
        &self,
        criteria: &Criteria,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        criteria.validate()?;

        let effective = match &criteria.object {
            Some(object) => {
                let coords = self.resolver.resolve(object)?;
                info!(object, ra = coords.ra, dec = coords.dec, "object name resolved");
                let mut resolved = criteria.clone();
                resolved.object = None;
                resolved.position = Some(Position::Circle {
                    ra: coords.ra,
                    dec: coords.dec,
                    radius: DEFAULT_OBJECT_RADIUS_DEG,
                });
                resolved
            }
            None => criteria.clone(),
        };

        let adql = query::build_select(&effective);
        self.run(adql, session, options, outpath)
    }

    /// Fetch the files referenced by a previously retrieved result table;
    /// see [`download::download`] for the per-row failure contract.
    pub fn download(
        &self,
        metapath: &Path,
        datalevel: DataLevel,
        format: TableFormat,
        outdir: &Path,
        session: Option<&Session>,
        options: &DownloadOptions,
    ) -> Result<DownloadSummary, NeidError> {
        download::download(
            &self.files,
            metapath,
            datalevel,
            format,
            outdir,
            session,
            options,
        )
    }

    fn run(
        &self,
        adql: String,
        session: Option<&Session>,
        options: &QueryOptions,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let request = TapRequest {
            query: adql,
            format: options.format,
            maxrec: options.maxrec,
        };
        self.tap.execute(&request, session, outpath)
    }
}
