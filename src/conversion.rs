use mongodb::bson::Bson;
use num::traits::NumCast;

/// Lenient numeric coercion. The source dataset stores several numeric
/// columns as strings ("365", ""), so string values are parsed as well;
/// anything unparseable becomes `None`.
pub(crate) fn bson_number<T: NumCast>(value: &Bson) -> Option<T> {
    match value {
        Bson::Double(v) => NumCast::from(*v),
        Bson::Int32(v) => NumCast::from(*v),
        Bson::Int64(v) => NumCast::from(*v),
        Bson::String(s) => s.trim().parse::<f64>().ok().and_then(NumCast::from),
        _ => None,
    }
}

/// Renders a scalar BSON value the way it should appear in report lines.
pub(crate) fn bson_scalar_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::Double(v) => v.to_string(),
        Bson::Boolean(v) => v.to_string(),
        Bson::ObjectId(oid) => oid.to_string(),
        Bson::Null => "null".to_string(),
        other => other.to_string(),
    }
}
