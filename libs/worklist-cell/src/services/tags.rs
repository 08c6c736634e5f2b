//! Translation between DICOM attribute tags and internal worklist fields,
//! in both directions: query filters in, DICOM+JSON datasets out.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde_json::{json, Map, Value};

use crate::models::{WorkItem, WorklistError};

/// UPS Push SOP class, emitted as 00080016 on every dataset.
pub const UPS_SOP_CLASS_UID: &str = "1.2.840.10008.5.1.4.34.5";

/// Static tag-to-field table. Unknown tags are ignored, not rejected.
pub fn internal_field(tag: &str) -> Option<&'static str> {
    match tag {
        "00100020" => Some("patient"),           // Patient ID
        "00100010" => Some("patient_name"),      // Patient Name
        "00100030" => Some("date_of_birth"),     // DOB
        "00100040" => Some("gender"),            // Gender
        "00400001" => Some("scheduled_date"),    // Scheduled Date
        "00400002" => Some("scheduled_date"),    // Fallback Scheduled Date
        "00400003" => Some("scheduled_time"),    // Scheduled Time
        "00404010" => Some("procedure_code"),    // Procedure Code
        "00080050" => Some("accession_number"),  // Accession Number
        "00081030" => Some("modality"),          // Modality
        "0008005A" => Some("station_ae"),        // Scheduled Device
        _ => None,
    }
}

/// Tags that match with `like` instead of equality.
pub const PARTIAL_MATCH_TAGS: [&str; 1] = ["00100010"];

/// Tags that accept `<tag>__from` / `<tag>__to` range pairs.
pub const RANGE_TAGS: [&str; 1] = ["00400002"];

/// Tags whose string values use caret-delimited DICOM name format.
const CARET_DELIMITED_TAGS: [&str; 2] = ["00100010", "00081030"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    Eq(String),
    Like(String),
    Gte(String),
    Lte(String),
}

pub fn dicomify_gender(value: &str) -> &'static str {
    match value.trim().to_lowercase().as_str() {
        "male" => "M",
        "female" => "F",
        "other" => "O",
        "unknown" => "U",
        _ => "U",
    }
}

/// Caret-to-space translation for PN-formatted values.
pub fn dicom_value_to_internal(tag: &str, value: &str) -> String {
    if CARET_DELIMITED_TAGS.contains(&tag) {
        value.replace('^', " ")
    } else {
        value.to_string()
    }
}

/// Map a DICOM filter dictionary to internal field filters.
///
/// Exact match by default, `like` for the partial-match tag set, ranges via
/// paired `<tag>__from`/`<tag>__to` keys for the range tag set. Unknown
/// tags are silently dropped. The result always constrains to Scheduled
/// status unless a literal `status` key overrides it.
pub fn filters_to_query(filters: &Map<String, Value>) -> Vec<(String, FilterOp)> {
    let mut query: Vec<(String, FilterOp)> = Vec::new();

    for (tag, value) in filters {
        if tag.ends_with("__from") || tag.ends_with("__to") || tag == "status" {
            continue;
        }

        let field = match internal_field(tag) {
            Some(field) => field,
            None => continue,
        };

        let raw = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        };
        let clean = dicom_value_to_internal(tag, &raw);

        if PARTIAL_MATCH_TAGS.contains(&tag.as_str()) {
            query.push((field.to_string(), FilterOp::Like(format!("%{}%", clean))));
        } else {
            query.push((field.to_string(), FilterOp::Eq(clean)));
        }
    }

    for tag in RANGE_TAGS {
        let field = match internal_field(tag) {
            Some(field) => field,
            None => continue,
        };

        let from_val = filters.get(&format!("{}__from", tag)).and_then(Value::as_str);
        let to_val = filters.get(&format!("{}__to", tag)).and_then(Value::as_str);

        if let Some(from) = from_val {
            query.push((field.to_string(), FilterOp::Gte(from.to_string())));
        }
        if let Some(to) = to_val {
            query.push((field.to_string(), FilterOp::Lte(to.to_string())));
        }
    }

    let status = filters
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("Scheduled");
    query.push(("status".to_string(), FilterOp::Eq(status.to_string())));

    query
}

/// Render internal filters as store query-string segments.
pub fn to_query_segments(query: &[(String, FilterOp)]) -> Vec<String> {
    query
        .iter()
        .map(|(field, op)| match op {
            FilterOp::Eq(v) => format!("{}=eq.{}", field, v),
            FilterOp::Like(v) => format!("{}=like.{}", field, v.replace('%', "*")),
            FilterOp::Gte(v) => format!("{}=gte.{}", field, v),
            FilterOp::Lte(v) => format!("{}=lte.{}", field, v),
        })
        .collect()
}

pub fn format_da(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn format_tm(time: NaiveTime) -> String {
    format!("{:02}{:02}{:02}", time.hour(), time.minute(), time.second())
}

fn vr(code: &str, value: Value) -> Value {
    json!({ "vr": code, "Value": [value] })
}

/// Encode a worklist entry as a DICOM+JSON dataset. Fields the dataset
/// cannot do without raise `MissingAttribute`; the caller logs and skips
/// the entry rather than failing the whole worklist.
pub fn to_dicom_json(item: &WorkItem) -> Result<Value, WorklistError> {
    let uid = item
        .ups_instance_uid
        .as_ref()
        .ok_or_else(|| WorklistError::MissingAttribute("ups_instance_uid".to_string()))?;
    let accession = item
        .accession_number
        .as_ref()
        .ok_or_else(|| WorklistError::MissingAttribute("accession_number".to_string()))?;
    let patient = item
        .patient
        .as_ref()
        .ok_or_else(|| WorklistError::MissingAttribute("patient".to_string()))?;
    let patient_name = item
        .patient_name
        .as_ref()
        .ok_or_else(|| WorklistError::MissingAttribute("patient_name".to_string()))?;
    let date_of_birth = item
        .date_of_birth
        .ok_or_else(|| WorklistError::MissingAttribute("date_of_birth".to_string()))?;
    let scheduled_date = item
        .scheduled_date
        .ok_or_else(|| WorklistError::MissingAttribute("scheduled_date".to_string()))?;
    let scheduled_time = item
        .scheduled_time
        .ok_or_else(|| WorklistError::MissingAttribute("scheduled_time".to_string()))?;

    let da = format_da(scheduled_date);
    let tm = format_tm(scheduled_time);

    let gender = item.gender.as_deref().unwrap_or("unknown");

    Ok(json!({
        "00080016": vr("UI", Value::String(UPS_SOP_CLASS_UID.to_string())),
        "00080018": vr("UI", Value::String(uid.clone())),
        "00080050": vr("SH", Value::String(accession.clone())),
        "00100020": vr("LO", Value::String(patient.replace(' ', "-"))),
        "00100010": vr("PN", Value::String(patient_name.replace(' ', "^"))),
        "00100040": vr("CS", Value::String(dicomify_gender(gender).to_string())),
        "00100030": vr("DA", Value::String(format_da(date_of_birth))),
        "00404010": {
            "vr": "SQ",
            "Value": [{
                "00080100": vr("SH", Value::String(item.procedure_code.clone().unwrap_or_default())),
                "00081030": vr("LO", Value::String(item.modality.clone().unwrap_or_default())),
            }]
        },
        "0008005A": vr("AE", Value::String(item.station_ae.clone().unwrap_or_default())),
        "00400002": vr("DA", Value::String(da.clone())),
        "00404011": vr("DT", Value::String(format!("{}{}", da, tm))),
    }))
}

/// First value of a `{"vr": ..., "Value": [...]}` wrapper in a dataset.
pub fn dataset_string(dataset: &Value, tag: &str) -> Option<String> {
    dataset
        .get(tag)?
        .get("Value")?
        .get(0)?
        .as_str()
        .map(str::to_string)
}
