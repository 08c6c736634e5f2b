//! Ping and conformance payloads for DICOMWeb clients.

use chrono::Utc;
use serde_json::{json, Value};

pub fn verification() -> Value {
    json!({
        "status": "success",
        "message": "Meridian DICOMWeb service is online.",
        "timestamp": Utc::now().to_rfc3339(),
    })
}

pub fn conformance_statement() -> Value {
    json!({
        "service": "DICOMWeb UPS-RS",
        "version": env!("CARGO_PKG_VERSION"),
        "organization": "Meridian Clinic",
        "supported_endpoints": [
            "GET /dicom-web/workitems",
            "POST /dicom-web/workitems",
            "PUT /dicom-web/workitems/{uid}",
            "POST /dicom-web/workitems/{uid}/claim",
            "POST /dicom-web/workitems/{uid}/cancelrequest",
            "POST /dicom-web/workitems/{uid}/workitemevent",
        ],
        "formats": ["application/dicom+json"],
        "authentication": "Header-based: X-AE-TITLE + X-AE-TOKEN",
        "note": "Only UPS-RS is supported at this endpoint. If the UPS SOP \
                 Instance UID is not available, the accession number or study \
                 instance UID can address a workitem.",
    })
}
