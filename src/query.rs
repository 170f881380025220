use crate::domain::{Criteria, DATETIME_FORMAT, DatetimeRange, Position};

/// Observation-time column in the archive's metadata tables.
const DATETIME_COLUMN: &str = "date_obs";

/// Build the ADQL statement for a set of criteria. `object` is expected to
/// have been resolved into `position` by the caller; predicates are emitted
/// in a fixed order so equal criteria always produce an identical statement.
pub fn build_select(criteria: &Criteria) -> String {
    let mut predicates = Vec::new();

    if let Some(range) = &criteria.datetime {
        predicates.push(datetime_predicate(range));
    }
    if let Some(position) = &criteria.position {
        predicates.push(position_predicate(position));
    }
    if let Some(qobject) = &criteria.qobject {
        predicates.push(equality_predicate("qobject", qobject));
    }
    if let Some(program) = &criteria.program {
        predicates.push(equality_predicate("program", program));
    }
    if let Some(piname) = &criteria.piname {
        predicates.push(equality_predicate("piname", piname));
    }
    if let Some(obstype) = &criteria.obstype {
        predicates.push(equality_predicate("obstype", obstype));
    }

    let table = criteria.datalevel.table();
    if predicates.is_empty() {
        format!("select * from {table}")
    } else {
        format!("select * from {table} where {}", predicates.join(" and "))
    }
}

fn datetime_predicate(range: &DatetimeRange) -> String {
    match range {
        DatetimeRange::Between(start, end) => format!(
            "({col} >= '{}' and {col} <= '{}')",
            start.format(DATETIME_FORMAT),
            end.format(DATETIME_FORMAT),
            col = DATETIME_COLUMN,
        ),
        DatetimeRange::From(start) => format!(
            "{DATETIME_COLUMN} >= '{}'",
            start.format(DATETIME_FORMAT)
        ),
        DatetimeRange::Until(end) => {
            format!("{DATETIME_COLUMN} <= '{}'", end.format(DATETIME_FORMAT))
        }
        DatetimeRange::At(instant) => {
            format!("{DATETIME_COLUMN} = '{}'", instant.format(DATETIME_FORMAT))
        }
    }
}

fn position_predicate(position: &Position) -> String {
    let region = match position {
        Position::Circle { ra, dec, radius } => {
            format!("circle('icrs', {ra}, {dec}, {radius})")
        }
        Position::Box {
            ra,
            dec,
            width,
            height,
        } => format!("box('icrs', {ra}, {dec}, {width}, {height})"),
        Position::Polygon { vertices } => {
            let coords = vertices
                .iter()
                .map(|(ra, dec)| format!("{ra}, {dec}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("polygon('icrs', {coords})")
        }
    };
    format!("contains(point('icrs', ra, dec), {region}) = 1")
}

fn equality_predicate(column: &str, value: &str) -> String {
    format!("{column} = '{}'", escape_literal(value.trim()))
}

/// ADQL string literals escape a single quote by doubling it.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
