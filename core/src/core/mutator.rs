use url::form_urlencoded;
use url::Url;

use crate::core::surface::{FormField, FormSurface, HttpMethod, ParamSurface};
use crate::http::HttpRequest;

/// Builds the request that submits `payload` through one form field.
///
/// Only that field is sent; the form's other fields are omitted so a hit is a
/// minimal reproduction. GET forms carry it in the query string of the action
/// URL (replacing a same-named pair), POST forms in an urlencoded body.
pub fn form_request(form: &FormSurface, field: &FormField, payload: &str) -> HttpRequest {
    match form.method {
        HttpMethod::Get => {
            let mut url = form.action.url().clone();
            set_query_param(&mut url, &field.name, payload);
            HttpRequest::get(url)
        }
        HttpMethod::Post => {
            let body = form_urlencoded::Serializer::new(String::new())
                .append_pair(&field.name, payload)
                .finish();
            HttpRequest::form_post(form.action.url().clone(), body)
        }
    }
}

/// Builds a GET of the page with `payload` substituted for the parameter's
/// value. Other parameters keep their original values and order.
pub fn param_request(surface: &ParamSurface, payload: &str) -> HttpRequest {
    let mut url = surface.page.url().clone();
    set_query_param(&mut url, &surface.param, payload);
    HttpRequest::get(url)
}

/// Replaces every value of `name` with `value`, or appends the pair when the
/// query has no such key.
fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let mut found = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == name {
                found = true;
                (k.to_string(), value.to_string())
            } else {
                (k.to_string(), v.to_string())
            }
        })
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        if !found {
            query.append_pair(name, value);
        }
    }
}
