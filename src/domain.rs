use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::NeidError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLevel {
    L0,
    L1,
    L2,
    Eng,
}

impl DataLevel {
    /// TAP table holding this level's metadata.
    pub fn table(&self) -> &'static str {
        match self {
            DataLevel::L0 => "neidl0",
            DataLevel::L1 => "neidl1",
            DataLevel::L2 => "neidl2",
            DataLevel::Eng => "neideng",
        }
    }
}

impl fmt::Display for DataLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLevel::L0 => write!(f, "l0"),
            DataLevel::L1 => write!(f, "l1"),
            DataLevel::L2 => write!(f, "l2"),
            DataLevel::Eng => write!(f, "eng"),
        }
    }
}

impl FromStr for DataLevel {
    type Err = NeidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "l0" => Ok(DataLevel::L0),
            "l1" => Ok(DataLevel::L1),
            "l2" => Ok(DataLevel::L2),
            "eng" => Ok(DataLevel::Eng),
            _ => Err(NeidError::InvalidDataLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Ipac,
    Csv,
    Tsv,
    Votable,
}

impl TableFormat {
    /// Value of the TAP `format` request parameter.
    pub fn tap_value(&self) -> &'static str {
        match self {
            TableFormat::Ipac => "ipac",
            TableFormat::Csv => "csv",
            TableFormat::Tsv => "tsv",
            TableFormat::Votable => "votable",
        }
    }

    /// Field delimiter, for the formats the table reader understands.
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            TableFormat::Csv => Some(b','),
            TableFormat::Tsv => Some(b'\t'),
            TableFormat::Ipac | TableFormat::Votable => None,
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tap_value())
    }
}

impl FromStr for TableFormat {
    type Err = NeidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ipac" => Ok(TableFormat::Ipac),
            "csv" => Ok(TableFormat::Csv),
            "tsv" => Ok(TableFormat::Tsv),
            "votable" => Ok(TableFormat::Votable),
            _ => Err(NeidError::InvalidFormat(value.to_string())),
        }
    }
}

/// Observation-time constraint parsed from the archive's `datetime1/datetime2`
/// convention. Either side of the separator may be omitted for an open-ended
/// range; a bare timestamp matches exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeRange {
    Between(NaiveDateTime, NaiveDateTime),
    From(NaiveDateTime),
    Until(NaiveDateTime),
    At(NaiveDateTime),
}

impl FromStr for DatetimeRange {
    type Err = NeidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NeidError::InvalidDatetimeRange(
                "empty datetime string".to_string(),
            ));
        }

        let range = match trimmed.split_once('/') {
            None => DatetimeRange::At(parse_timestamp(trimmed)?),
            Some((start, "")) => DatetimeRange::From(parse_timestamp(start)?),
            Some(("", end)) => DatetimeRange::Until(parse_timestamp(end)?),
            Some((start, end)) => {
                let start = parse_timestamp(start)?;
                let end = parse_timestamp(end)?;
                if start > end {
                    return Err(NeidError::InvalidDatetimeRange(format!(
                        "start {start} is later than end {end}"
                    )));
                }
                DatetimeRange::Between(start, end)
            }
        };
        Ok(range)
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, NeidError> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).map_err(|err| {
        NeidError::InvalidDatetimeRange(format!("bad timestamp [{}]: {err}", value.trim()))
    })
}

/// Sky region in J2000 decimal degrees, parsed from the archive's
/// space-delimited shape strings (`circle ra dec radius`,
/// `box ra dec width height`, `polygon ra1 dec1 ra2 dec2 ...`).
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    Circle { ra: f64, dec: f64, radius: f64 },
    Box { ra: f64, dec: f64, width: f64, height: f64 },
    Polygon { vertices: Vec<(f64, f64)> },
}

impl FromStr for Position {
    type Err = NeidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut tokens = value.split_whitespace();
        let shape = tokens
            .next()
            .ok_or_else(|| NeidError::InvalidPosition("empty position string".to_string()))?;
        let numbers = tokens
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    NeidError::InvalidPosition(format!("non-numeric token [{token}]"))
                })
            })
            .collect::<Result<Vec<f64>, NeidError>>()?;

        match shape.to_lowercase().as_str() {
            "circle" => match numbers.as_slice() {
                &[ra, dec, radius] => Ok(Position::Circle { ra, dec, radius }),
                _ => Err(NeidError::InvalidPosition(format!(
                    "circle takes 3 values (ra dec radius), got {}",
                    numbers.len()
                ))),
            },
            "box" => match numbers.as_slice() {
                &[ra, dec, width, height] => Ok(Position::Box {
                    ra,
                    dec,
                    width,
                    height,
                }),
                _ => Err(NeidError::InvalidPosition(format!(
                    "box takes 4 values (ra dec width height), got {}",
                    numbers.len()
                ))),
            },
            "polygon" => {
                if numbers.len() < 6 || numbers.len() % 2 != 0 {
                    return Err(NeidError::InvalidPosition(format!(
                        "polygon takes an even number of at least 6 values, got {}",
                        numbers.len()
                    )));
                }
                let vertices = numbers.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
                Ok(Position::Polygon { vertices })
            }
            other => Err(NeidError::InvalidPosition(format!(
                "unknown shape keyword [{other}]"
            ))),
        }
    }
}

/// Multi-predicate search. `datalevel` selects the table; every other field
/// contributes one conjunctive constraint when present.
#[derive(Debug, Clone)]
pub struct Criteria {
    pub datalevel: DataLevel,
    pub datetime: Option<DatetimeRange>,
    pub position: Option<Position>,
    pub object: Option<String>,
    pub qobject: Option<String>,
    pub program: Option<String>,
    pub piname: Option<String>,
    pub obstype: Option<String>,
}

impl Criteria {
    pub fn new(datalevel: DataLevel) -> Self {
        Self {
            datalevel,
            datetime: None,
            position: None,
            object: None,
            qobject: None,
            program: None,
            piname: None,
            obstype: None,
        }
    }

    /// Build criteria from string key/value pairs, the shape a caller holds
    /// when the keys come from user input. Unrecognized keys are rejected by
    /// name. `datalevel` is required.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, NeidError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut datalevel: Option<DataLevel> = None;
        let mut criteria = Criteria::new(DataLevel::L0);

        for (key, value) in pairs {
            match key.trim().to_lowercase().as_str() {
                "datalevel" => datalevel = Some(value.parse()?),
                "datetime" => criteria.datetime = Some(value.parse()?),
                "position" => criteria.position = Some(value.parse()?),
                "object" => criteria.object = Some(value.to_string()),
                "qobject" => criteria.qobject = Some(value.to_string()),
                "program" => criteria.program = Some(value.to_string()),
                "piname" => criteria.piname = Some(value.to_string()),
                "obstype" => criteria.obstype = Some(value.to_string()),
                _ => return Err(NeidError::UnknownCriterion(key.to_string())),
            }
        }

        criteria.datalevel =
            datalevel.ok_or(NeidError::EmptyParameter("datalevel"))?;
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn validate(&self) -> Result<(), NeidError> {
        if self.object.is_some() && self.qobject.is_some() {
            return Err(NeidError::ConflictingCriteria(
                "object and qobject cannot be combined".to_string(),
            ));
        }
        if self.object.is_some() && self.position.is_some() {
            return Err(NeidError::ConflictingCriteria(
                "object resolves to a position and cannot be combined with one".to_string(),
            ));
        }
        check_not_blank(self.object.as_deref(), "object")?;
        check_not_blank(self.qobject.as_deref(), "qobject")?;
        check_not_blank(self.program.as_deref(), "program")?;
        check_not_blank(self.piname.as_deref(), "piname")?;
        check_not_blank(self.obstype.as_deref(), "obstype")?;
        Ok(())
    }
}

fn check_not_blank(value: Option<&str>, name: &'static str) -> Result<(), NeidError> {
    match value {
        Some(text) if text.trim().is_empty() => Err(NeidError::EmptyParameter(name)),
        _ => Ok(()),
    }
}
