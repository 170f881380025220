use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use neid_archive::archive::{Archive, QueryOptions};
use neid_archive::domain::{Criteria, DataLevel, TableFormat};
use neid_archive::download::{CalibEntry, DownloadClient};
use neid_archive::error::NeidError;
use neid_archive::lookup::{NameResolver, ResolvedCoords};
use neid_archive::session::Session;
use neid_archive::tap::{TapClient, TapRequest};

#[derive(Clone, Default)]
struct RecordingTap {
    requests: Arc<Mutex<Vec<TapRequest>>>,
    cookies: Arc<Mutex<Vec<Option<String>>>>,
}

impl TapClient for RecordingTap {
    fn execute(
        &self,
        request: &TapRequest,
        session: Option<&Session>,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        self.requests.lock().unwrap().push(request.clone());
        self.cookies
            .lock()
            .unwrap()
            .push(session.map(Session::cookie_header));
        fs::write(outpath, "obsid\n1\n").map_err(|err| NeidError::Filesystem(err.to_string()))
    }
}

impl RecordingTap {
    fn last_query(&self) -> String {
        self.requests.lock().unwrap().last().unwrap().query.clone()
    }
}

struct FixedResolver;

impl NameResolver for FixedResolver {
    fn resolve(&self, object: &str) -> Result<ResolvedCoords, NeidError> {
        Ok(ResolvedCoords {
            objname: object.to_string(),
            ra: 165.0188,
            dec: 35.9694,
        })
    }
}

struct FailingResolver;

impl NameResolver for FailingResolver {
    fn resolve(&self, object: &str) -> Result<ResolvedCoords, NeidError> {
        Err(NeidError::Query(format!(
            "object name [{object}] lookup error: not found"
        )))
    }
}

struct NoDownloads;

impl DownloadClient for NoDownloads {
    fn fetch_file(
        &self,
        _datalevel: DataLevel,
        _filepath: &str,
        _session: Option<&Session>,
        _destination: &Path,
    ) -> Result<(), NeidError> {
        unreachable!("query tests never download")
    }

    fn fetch_caliblist(
        &self,
        _datalevel: DataLevel,
        _filename: &str,
        _session: Option<&Session>,
    ) -> Result<Vec<CalibEntry>, NeidError> {
        unreachable!("query tests never download")
    }
}

fn archive(tap: RecordingTap) -> Archive<RecordingTap, FixedResolver, NoDownloads> {
    Archive::new(tap, FixedResolver, NoDownloads)
}

#[test]
fn datetime_query_builds_range_predicate_and_writes_outpath() {
    let temp = tempfile::tempdir().unwrap();
    let outpath = temp.path().join("datetime.l0.tbl");
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    archive
        .query_datetime(
            DataLevel::L0,
            "2021-01-16 06:10:55/2021-01-16 23:59:59",
            None,
            &QueryOptions::default(),
            &outpath,
        )
        .unwrap();

    assert_eq!(
        tap.last_query(),
        "select * from neidl0 where \
         (date_obs >= '2021-01-16 06:10:55' and date_obs <= '2021-01-16 23:59:59')"
    );
    assert!(outpath.exists());
}

#[test]
fn datetime_query_validates_before_any_request() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    let err = archive
        .query_datetime(
            DataLevel::L0,
            "2021-02-18 00:00:00/2021-01-16 06:10:55",
            None,
            &QueryOptions::default(),
            &temp.path().join("never.tbl"),
        )
        .unwrap_err();

    assert_matches!(err, NeidError::InvalidDatetimeRange(_));
    assert!(tap.requests.lock().unwrap().is_empty());
}

#[test]
fn position_query_forwards_numeric_tokens_unchanged() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    archive
        .query_position(
            DataLevel::L1,
            "circle 23.634 68.95 1.0",
            None,
            &QueryOptions::default(),
            &temp.path().join("pos.l1.tbl"),
        )
        .unwrap();

    assert_eq!(
        tap.last_query(),
        "select * from neidl1 where \
         contains(point('icrs', ra, dec), circle('icrs', 23.634, 68.95, 1)) = 1"
    );
}

#[test]
fn object_query_resolves_name_into_cone_search() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    archive
        .query_object(
            DataLevel::L1,
            "HD 95735",
            None,
            None,
            &QueryOptions::default(),
            &temp.path().join("object.l1.tbl"),
        )
        .unwrap();

    assert_eq!(
        tap.last_query(),
        "select * from neidl1 where \
         contains(point('icrs', ra, dec), circle('icrs', 165.0188, 35.9694, 0.5)) = 1"
    );
}

#[test]
fn unresolvable_object_surfaces_lookup_error() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = Archive::new(tap.clone(), FailingResolver, NoDownloads);

    let err = archive
        .query_object(
            DataLevel::L1,
            "NOT A STAR",
            None,
            None,
            &QueryOptions::default(),
            &temp.path().join("object.tbl"),
        )
        .unwrap_err();

    assert_matches!(err, NeidError::Query(msg) if msg.contains("NOT A STAR"));
    assert!(tap.requests.lock().unwrap().is_empty());
}

#[test]
fn criteria_query_merges_predicates_into_one_request() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    let criteria = Criteria::from_pairs([
        ("datalevel", "l0"),
        ("datetime", "2021-01-14 00:00:00/2021-01-14 23:59:59"),
        ("object", "HD 95735"),
    ])
    .unwrap();
    archive
        .query_criteria(
            &criteria,
            None,
            &QueryOptions::default(),
            &temp.path().join("criteria.tbl"),
        )
        .unwrap();

    let requests = tap.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].query,
        "select * from neidl0 where \
         (date_obs >= '2021-01-14 00:00:00' and date_obs <= '2021-01-14 23:59:59') \
         and contains(point('icrs', ra, dec), circle('icrs', 165.0188, 35.9694, 0.5)) = 1"
    );
}

#[test]
fn unrecognized_criteria_key_is_named() {
    let err = Criteria::from_pairs([("datalevel", "l0"), ("bogus", "1")]).unwrap_err();
    assert_matches!(err, NeidError::UnknownCriterion(key) if key == "bogus");
}

#[test]
fn adql_passthrough_is_verbatim() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    let adql = "select obsid, date_obs from neidl0 where obsid > 1000";
    archive
        .query_adql(adql, None, &QueryOptions::default(), &temp.path().join("adql.tbl"))
        .unwrap();

    assert_eq!(tap.last_query(), adql);
}

#[test]
fn empty_adql_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let archive = archive(RecordingTap::default());
    let err = archive
        .query_adql("  ", None, &QueryOptions::default(), &temp.path().join("x.tbl"))
        .unwrap_err();
    assert_matches!(err, NeidError::EmptyParameter("query"));
}

#[test]
fn empty_program_and_piname_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let archive = archive(RecordingTap::default());
    let options = QueryOptions::default();

    let err = archive
        .query_program(DataLevel::L0, " ", None, &options, &temp.path().join("p.tbl"))
        .unwrap_err();
    assert_matches!(err, NeidError::EmptyParameter("program"));

    let err = archive
        .query_piname(DataLevel::L0, "", None, &options, &temp.path().join("p.tbl"))
        .unwrap_err();
    assert_matches!(err, NeidError::EmptyParameter("piname"));
}

#[test]
fn anonymous_query_sends_no_cookie_and_succeeds() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    archive
        .query_program(
            DataLevel::L2,
            "2021B-0034",
            None,
            &QueryOptions::default(),
            &temp.path().join("prog.tbl"),
        )
        .unwrap();

    assert_eq!(tap.cookies.lock().unwrap().as_slice(), [None]);
    assert_eq!(
        tap.last_query(),
        "select * from neidl2 where program = '2021B-0034'"
    );
}

#[test]
fn session_cookie_is_attached_when_given() {
    let temp = tempfile::tempdir().unwrap();
    let cookiepath = temp.path().join("neid.cookie");
    fs::write(&cookiepath, "neidsession=abc123\n").unwrap();
    let session = Session::load(&cookiepath).unwrap();

    let tap = RecordingTap::default();
    let archive = archive(tap.clone());
    archive
        .query_qobject(
            DataLevel::L0,
            "HD 10700",
            Some(&session),
            &QueryOptions::default(),
            &temp.path().join("qobj.tbl"),
        )
        .unwrap();

    assert_eq!(
        tap.cookies.lock().unwrap().as_slice(),
        [Some("neidsession=abc123".to_string())]
    );
}

#[test]
fn query_options_carry_format_and_maxrec() {
    let temp = tempfile::tempdir().unwrap();
    let tap = RecordingTap::default();
    let archive = archive(tap.clone());

    let options = QueryOptions {
        format: TableFormat::Csv,
        maxrec: Some(100),
    };
    archive
        .query_qobject(
            DataLevel::L0,
            "HD 10700",
            None,
            &options,
            &temp.path().join("qobj.csv"),
        )
        .unwrap();

    let requests = tap.requests.lock().unwrap();
    assert_eq!(requests[0].format, TableFormat::Csv);
    assert_eq!(requests[0].maxrec, Some(100));
}
