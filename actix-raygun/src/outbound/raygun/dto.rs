//! DTOs for encoding Raygun crash reports.
//!
//! The adapter maps a domain [`Report`] into these borrowed transport DTOs in
//! one pass, then serialises them as camelCase JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{Report, RequestDetail, StackFrame};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunEntryDto<'a> {
    #[serde(serialize_with = "serialize_timestamp")]
    pub(super) occurred_on: DateTime<Utc>,
    pub(super) details: RaygunDetailsDto<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunDetailsDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) machine_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) version: Option<&'a str>,
    pub(super) error: RaygunErrorDto<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) request: Option<RaygunRequestDto<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) response: Option<RaygunResponseDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) user_custom_data: Option<&'a Value>,
    #[serde(skip_serializing_if = "no_tags")]
    pub(super) tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) user: Option<RaygunUserDto<'a>>,
    pub(super) client: RaygunClientDto<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunErrorDto<'a> {
    pub(super) message: &'a str,
    pub(super) class_name: &'a str,
    pub(super) stack_trace: Vec<RaygunStackFrameDto<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunStackFrameDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) line_number: Option<u32>,
    pub(super) class_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) file_name: Option<&'a str>,
    pub(super) method_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunRequestDto<'a> {
    pub(super) host_name: &'a str,
    pub(super) url: &'a str,
    pub(super) http_method: &'a str,
    #[serde(rename = "iPAddress", skip_serializing_if = "Option::is_none")]
    pub(super) ip_address: Option<&'a str>,
    pub(super) query_string: &'a BTreeMap<String, String>,
    pub(super) headers: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunResponseDto {
    pub(super) status_code: u16,
}

#[derive(Debug, Serialize)]
pub(super) struct RaygunUserDto<'a> {
    pub(super) identifier: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RaygunClientDto<'a> {
    pub(super) name: &'a str,
    pub(super) version: &'a str,
    pub(super) client_url: &'a str,
}

// Raygun expects ISO-8601 with a `Z` suffix and millisecond precision.
fn serialize_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

impl<'a> From<&'a Report> for RaygunEntryDto<'a> {
    fn from(report: &'a Report) -> Self {
        Self {
            occurred_on: report.occurred_on,
            details: RaygunDetailsDto {
                machine_name: report.machine_name.as_deref(),
                version: report.version.as_deref(),
                error: RaygunErrorDto {
                    message: &report.error.message,
                    class_name: &report.error.class_name,
                    stack_trace: report
                        .error
                        .stack_trace
                        .frames()
                        .iter()
                        .map(RaygunStackFrameDto::from)
                        .collect(),
                },
                request: report.request.as_ref().map(RaygunRequestDto::from),
                response: report
                    .response_status
                    .map(|status_code| RaygunResponseDto { status_code }),
                user_custom_data: report.user_custom_data.as_ref(),
                tags: &report.tags,
                user: report.user.as_ref().map(|user| RaygunUserDto {
                    identifier: &user.identifier,
                }),
                client: RaygunClientDto {
                    name: report.client.name,
                    version: report.client.version,
                    client_url: report.client.client_url,
                },
            },
        }
    }
}

impl<'a> From<&'a StackFrame> for RaygunStackFrameDto<'a> {
    fn from(frame: &'a StackFrame) -> Self {
        Self {
            line_number: frame.line_number,
            class_name: &frame.class_name,
            file_name: frame.file_name.as_deref(),
            method_name: &frame.method_name,
        }
    }
}

impl<'a> From<&'a RequestDetail> for RaygunRequestDto<'a> {
    fn from(request: &'a RequestDetail) -> Self {
        Self {
            host_name: &request.host_name,
            url: &request.url,
            http_method: &request.http_method,
            ip_address: request.ip_address.as_deref(),
            query_string: &request.query_string,
            headers: &request.headers,
        }
    }
}
