use serde::{Deserialize, Serialize};
use url::Url;

/// An absolute URL with its fragment removed.
///
/// Equality is exact string identity of the serialized URL: no trailing-slash,
/// default-port or parameter-order normalisation beyond what `Url` parsing does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target(Url);

impl Target {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw.trim()).map(Self::from_url)
    }

    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self(url)
    }

    /// Resolves `raw` against this target, as a browser resolves an href.
    pub fn join(&self, raw: &str) -> Result<Self, url::ParseError> {
        self.0.join(raw.trim()).map(Self::from_url)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_http(&self) -> bool {
        matches!(self.0.scheme(), "http" | "https")
    }

    /// Scheme, host and port all match.
    pub fn same_origin(&self, other: &Target) -> bool {
        self.0.scheme() == other.0.scheme()
            && self.0.host_str() == other.0.host_str()
            && self.0.port_or_known_default() == other.0.port_or_known_default()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Case-insensitive; anything other than `post` is treated as GET.
    pub fn from_form_attr(raw: Option<&str>) -> Self {
        match raw.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Password,
    Hidden,
}

impl FieldKind {
    /// Maps an `<input type>` to a probed kind. A missing type is `text`,
    /// as in HTML, so untyped inputs are probed too rather than skipped.
    /// Other types (submit, checkbox, file, ...) are not probed.
    pub fn from_input_type(raw: Option<&str>) -> Option<Self> {
        let kind = raw.map(|t| t.trim().to_ascii_lowercase());
        match kind.as_deref() {
            None | Some("") | Some("text") => Some(FieldKind::Text),
            Some("password") => Some(FieldKind::Password),
            Some("hidden") => Some(FieldKind::Hidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormSurface {
    pub action: Target,
    pub method: HttpMethod,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamSurface {
    pub page: Target,
    pub param: String,
}

/// A single injectable point found on a fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Surface {
    Form(FormSurface),
    Param(ParamSurface),
}

impl Surface {
    pub fn describe(&self) -> String {
        match self {
            Surface::Form(form) => {
                let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
                format!("form {} {} [{}]", form.method, form.action, names.join(", "))
            }
            Surface::Param(param) => format!("param '{}' of {}", param.param, param.page),
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Surface::Form(_))
    }
}
