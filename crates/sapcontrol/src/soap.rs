//! SOAP envelope assembly and response decoding.
//!
//! The webservice speaks plain SOAP 1.1 in the `urn:SAPControl` namespace.
//! Requests are small enough to assemble directly; responses are walked with
//! a pull parser collecting the repeated `<item>` records.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::QName;

use crate::error::{Error, Result};
use crate::types::{OsProcess, StateColor, SystemInstance};

/// Wrap an operation body into a SOAP 1.1 envelope.
pub fn envelope(operation: &str, inner: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<SOAP-ENV:Body>",
            r#"<{op} xmlns="urn:SAPControl">{inner}</{op}>"#,
            "</SOAP-ENV:Body>",
            "</SOAP-ENV:Envelope>"
        ),
        op = operation,
        inner = inner,
    )
}

/// Fail on a SOAP fault; the fault string becomes the error message.
pub fn check_fault(body: &str) -> Result<()> {
    if let Some(fault) = element_text(body, "faultstring")? {
        return Err(Error::Fault(fault));
    }
    Ok(())
}

/// Decode a `GetProcessListResponse` body.
pub fn parse_process_list(body: &str) -> Result<Vec<OsProcess>> {
    let items = collect_items(body)?;

    Ok(items
        .into_iter()
        .map(|fields| OsProcess {
            name: fields.get("name").cloned().unwrap_or_default(),
            description: fields.get("description").cloned().unwrap_or_default(),
            dispstatus: fields
                .get("dispstatus")
                .and_then(|value| StateColor::from_wire(value)),
            textstatus: fields.get("textstatus").cloned().unwrap_or_default(),
            pid: fields
                .get("pid")
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
        })
        .collect())
}

/// Decode a `GetSystemInstanceListResponse` body.
pub fn parse_system_instance_list(body: &str) -> Result<Vec<SystemInstance>> {
    let items = collect_items(body)?;

    Ok(items
        .into_iter()
        .map(|fields| SystemInstance {
            hostname: fields.get("hostname").cloned().unwrap_or_default(),
            instance_nr: fields
                .get("instanceNr")
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            features: fields.get("features").cloned().unwrap_or_default(),
            dispstatus: fields
                .get("dispstatus")
                .and_then(|value| StateColor::from_wire(value)),
        })
        .collect())
}

/// Collect every `<item>` element as a field→text mapping.
fn collect_items(body: &str) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = local_name(start.name());
                if name == "item" {
                    current = Some(HashMap::new());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let value = text
                        .unescape()
                        .map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
                    fields.insert(name.clone(), value.into_owned());
                }
            }
            Ok(Event::End(end)) => {
                let name = local_name(end.name());
                if name == "item"
                    && let Some(fields) = current.take()
                {
                    items.push(fields);
                } else {
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::UnexpectedResponse(e.to_string())),
        }
    }

    Ok(items)
}

/// Text content of the first element with the given local name, if any.
fn element_text(body: &str, wanted: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                inside = local_name(start.name()) == wanted;
            }
            Ok(Event::Text(text)) if inside => {
                let value = text
                    .unescape()
                    .map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
                return Ok(Some(value.into_owned()));
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(Error::UnexpectedResponse(e.to_string())),
        }
    }
}

fn local_name(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.local_name().as_ref()).into_owned()
}
