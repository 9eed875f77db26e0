//! Typed record of the recognized URI (query string) parameters.
//!
//! Values are borrowed from the request target whenever no percent-decoding
//! was needed. Parsing happens once per request; see
//! [`ConnectionState::parse_uri_params`](crate::state::ConnectionState::parse_uri_params).

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;
use tracing::debug;

use super::problem::ProblemDetails;
use super::ApiVersion;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 1000;

/// Misuse of the URI parameter record.
///
/// Invalid parameter *values* are not errors of this kind; they are recorded
/// on the connection state as a 400 problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriParamError {
    /// The query string of this request was already parsed.
    AlreadyParsed,
}

impl fmt::Display for UriParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriParamError::AlreadyParsed => {
                write!(f, "URI parameters are write-once and were already parsed for this request")
            }
        }
    }
}

impl std::error::Error for UriParamError {}

/// Flags of `?options=a,b,c`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UriParamOptions {
    pub count: bool,
    pub normalized: bool,
    pub values: bool,
    pub key_values: bool,
    pub append: bool,
    pub unique_values: bool,
    pub date_created: bool,
    pub date_modified: bool,
    pub no_attr_detail: bool,
    pub upsert: bool,
    pub sys_attrs: bool,
    pub no_overwrite: bool,
    pub update: bool,
    pub replace: bool,
}

impl UriParamOptions {
    fn set(&mut self, option: &str) -> bool {
        let flag = match option {
            "count" => &mut self.count,
            "normalized" => &mut self.normalized,
            "values" => &mut self.values,
            "keyValues" => &mut self.key_values,
            "append" => &mut self.append,
            "unique" => &mut self.unique_values,
            "dateCreated" => &mut self.date_created,
            "dateModified" => &mut self.date_modified,
            "noAttrDetail" => &mut self.no_attr_detail,
            "upsert" => &mut self.upsert,
            "sysAttrs" => &mut self.sys_attrs,
            "noOverwrite" => &mut self.no_overwrite,
            "update" => &mut self.update,
            "replace" => &mut self.replace,
            _ => return false,
        };
        *flag = true;
        true
    }

    /// Parse a comma-separated option list. Unknown options and the
    /// mutually exclusive output formats are rejected.
    fn parse(value: &str) -> Result<Self, ProblemDetails> {
        let mut options = Self::default();
        for option in value.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            if !options.set(option) {
                return Err(ProblemDetails::bad_request(
                    "Invalid value for URI param /options/",
                    option,
                ));
            }
        }

        let exclusive = [
            (options.key_values, options.values, "keyValues and values"),
            (options.key_values, options.unique_values, "keyValues and unique"),
            (options.unique_values, options.values, "unique and values"),
        ];
        if let Some((_, _, pair)) = exclusive.iter().find(|(a, b, _)| *a && *b) {
            return Err(ProblemDetails::bad_request(
                "Incompatible values for URI param /options/",
                *pair,
            ));
        }
        Ok(options)
    }
}

/// Every URI parameter the broker understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UriParams<'r> {
    pub id: Option<Cow<'r, str>>,
    pub r#type: Option<Cow<'r, str>>,
    /// `type` split on `,`.
    pub types: SmallVec<[String; 4]>,
    pub id_pattern: Option<Cow<'r, str>>,
    pub type_pattern: Option<Cow<'r, str>>,
    pub attrs: Option<Cow<'r, str>>,
    pub metadata: Option<Cow<'r, str>>,
    pub q: Option<Cow<'r, str>>,
    pub mq: Option<Cow<'r, str>>,
    pub geometry: Option<Cow<'r, str>>,
    pub coordinates: Option<Cow<'r, str>>,
    pub georel: Option<Cow<'r, str>>,
    pub geoloc: Option<Cow<'r, str>>,
    pub geoproperty: Option<Cow<'r, str>>,
    pub geometry_property: Option<Cow<'r, str>>,
    pub dataset_id: Option<Cow<'r, str>>,
    pub timeproperty: Option<Cow<'r, str>>,
    pub timerel: Option<Cow<'r, str>>,
    pub time_at: Option<Cow<'r, str>>,
    pub end_time_at: Option<Cow<'r, str>>,
    pub subscription_id: Option<Cow<'r, str>>,
    pub url: Option<Cow<'r, str>>,
    pub exists: Option<Cow<'r, str>>,
    pub not_exists: Option<Cow<'r, str>>,
    pub order_by: Option<Cow<'r, str>>,
    pub attribute_format: Option<Cow<'r, str>>,
    pub level: Option<Cow<'r, str>>,
    pub options: UriParamOptions,
    pub offset: u32,
    pub limit: u32,
    pub count: bool,
    pub delete_all: bool,
    pub details: bool,
    pub pretty_print: bool,
    pub spaces: u32,
    pub location: bool,
    pub reload: bool,
    pub collapse: bool,
    pub reset: bool,
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ProblemDetails> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ProblemDetails::bad_request(
            format!("Invalid value for URI parameter /{name}/"),
            value,
        )),
    }
}

fn parse_u32(name: &str, value: &str) -> Result<u32, ProblemDetails> {
    value.parse::<u32>().map_err(|_| {
        ProblemDetails::bad_request(
            "Bad pagination arguments",
            format!("/{name}/ must be a non-negative integer, got '{value}'"),
        )
    })
}

impl<'r> UriParams<'r> {
    /// Parse the raw query string (without the leading `?`).
    ///
    /// The first invalid parameter aborts parsing and is reported as a
    /// `BadRequestData` problem.
    pub fn parse(query: &'r str, api_version: ApiVersion) -> Result<Self, ProblemDetails> {
        let mut params = UriParams {
            limit: DEFAULT_LIMIT,
            ..Default::default()
        };
        let mut limit_given = false;

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "id" => params.id = Some(value),
                "type" => {
                    params.types = value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect();
                    params.r#type = Some(value);
                }
                "idPattern" => params.id_pattern = Some(value),
                "typePattern" => params.type_pattern = Some(value),
                "attrs" => params.attrs = Some(value),
                "metadata" => params.metadata = Some(value),
                "q" => params.q = Some(value),
                "mq" => params.mq = Some(value),
                "geometry" => params.geometry = Some(value),
                "coords" | "coordinates" => params.coordinates = Some(value),
                "georel" => params.georel = Some(value),
                "geoloc" => params.geoloc = Some(value),
                "geoproperty" => params.geoproperty = Some(value),
                "geometryProperty" => params.geometry_property = Some(value),
                "datasetId" => params.dataset_id = Some(value),
                "timeproperty" => params.timeproperty = Some(value),
                "timerel" => params.timerel = Some(value),
                "timeAt" => params.time_at = Some(value),
                "endTimeAt" => params.end_time_at = Some(value),
                "subscriptionId" => params.subscription_id = Some(value),
                "url" => params.url = Some(value),
                "exists" => params.exists = Some(value),
                "notExists" => params.not_exists = Some(value),
                "orderBy" => params.order_by = Some(value),
                "attributeFormat" | "attrsFormat" => params.attribute_format = Some(value),
                "level" => params.level = Some(value),
                "options" => {
                    params.options = UriParamOptions::parse(&value)?;
                    if params.options.count {
                        params.count = true;
                    }
                }
                "offset" => params.offset = parse_u32("offset", &value)?,
                "limit" => {
                    params.limit = parse_u32("limit", &value)?;
                    limit_given = true;
                }
                "count" => params.count = parse_bool("count", &value)?,
                "deleteAll" => params.delete_all = parse_bool("deleteAll", &value)?,
                "details" => params.details = parse_bool("details", &value)?,
                "prettyPrint" => params.pretty_print = parse_bool("prettyPrint", &value)?,
                "spaces" => params.spaces = parse_u32("spaces", &value)?,
                "location" => params.location = parse_bool("location", &value)?,
                "reload" => params.reload = parse_bool("reload", &value)?,
                "collapse" => params.collapse = parse_bool("collapse", &value)?,
                "reset" => params.reset = parse_bool("reset", &value)?,
                other => {
                    debug!(param = %other, api = ?api_version, "Ignoring unknown URI parameter");
                }
            }
        }

        if limit_given {
            if params.limit > MAX_LIMIT {
                return Err(ProblemDetails::bad_request(
                    "Bad pagination arguments",
                    format!("/limit/ must not exceed {MAX_LIMIT}"),
                ));
            }
            if params.limit == 0 && !params.count {
                return Err(ProblemDetails::bad_request(
                    "Bad pagination arguments",
                    "/limit/ 0 is only allowed together with count",
                ));
            }
        }

        Ok(params)
    }
}
