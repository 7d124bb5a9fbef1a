//! Surface extraction from a fetched HTML page.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::core::surface::{FieldKind, FormField, FormSurface, HttpMethod, ParamSurface, Surface, Target};

/// Everything one page exposes to the probes and to the crawler.
#[derive(Debug, Clone, Default)]
pub struct ExtractedSurfaces {
    pub forms: Vec<FormSurface>,
    pub params: Vec<ParamSurface>,
    /// Every `<a href>` that resolved, unfiltered.
    pub links: Vec<Target>,
    /// Raw hrefs that could not be resolved, with the parse error.
    pub rejected_links: Vec<(String, String)>,
}

impl ExtractedSurfaces {
    pub fn surfaces(&self) -> Vec<Surface> {
        self.forms
            .iter()
            .cloned()
            .map(Surface::Form)
            .chain(self.params.iter().cloned().map(Surface::Param))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty() && self.params.is_empty() && self.links.is_empty()
    }
}

/// Parses `html` best-effort; malformed markup yields whatever the parser
/// recovered, never an error. Returned values own their data, nothing borrows
/// from the parsed document.
pub fn extract(page: &Target, html: &str) -> ExtractedSurfaces {
    let document = Html::parse_document(html);
    let (links, rejected_links) = extract_links(page, &document);

    ExtractedSurfaces {
        forms: extract_forms(page, &document),
        params: extract_params(page),
        links,
        rejected_links,
    }
}

fn extract_forms(page: &Target, document: &Html) -> Vec<FormSurface> {
    let form_selector = match Selector::parse("form") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let input_selector = match Selector::parse("input") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&form_selector)
        .map(|form| {
            let action = form
                .value()
                .attr("action")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .and_then(|a| page.join(a).ok())
                .unwrap_or_else(|| page.clone());

            FormSurface {
                action,
                method: HttpMethod::from_form_attr(form.value().attr("method")),
                fields: form_fields(form, &input_selector),
            }
        })
        .collect()
}

fn form_fields(form: ElementRef<'_>, input_selector: &Selector) -> Vec<FormField> {
    form.select(input_selector)
        .filter_map(|input| {
            let name = input.value().attr("name")?.trim();
            if name.is_empty() {
                return None;
            }
            let kind = FieldKind::from_input_type(input.value().attr("type"))?;
            Some(FormField {
                name: name.to_string(),
                kind,
            })
        })
        .collect()
}

/// One surface per distinct query key, in first-seen order.
fn extract_params(page: &Target) -> Vec<ParamSurface> {
    let mut seen = HashSet::new();
    page.url()
        .query_pairs()
        .filter_map(|(key, _)| {
            let key = key.into_owned();
            if key.is_empty() || !seen.insert(key.clone()) {
                return None;
            }
            Some(ParamSurface {
                page: page.clone(),
                param: key,
            })
        })
        .collect()
}

fn extract_links(page: &Target, document: &Html) -> (Vec<Target>, Vec<(String, String)>) {
    let mut links = Vec::new();
    let mut rejected = Vec::new();

    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return (links, rejected),
    };

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.trim().is_empty() {
            continue;
        }
        match page.join(href) {
            Ok(target) => links.push(target),
            Err(e) => rejected.push((href.to_string(), e.to_string())),
        }
    }

    (links, rejected)
}
