//! `Accept-Encoding` parsing and the gzip decision.

/// Quality assumed when a coding carries no usable `q=` parameter.
pub const DEFAULT_QUALITY: f32 = 1.0;

/// One entry of an `Accept-Encoding` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedEncoding {
    pub name: String,
    /// Weight in `[0.0, 1.0]`.
    pub quality: f32,
}

/// How [`accepts`] treats quality values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingGate {
    /// A coding is accepted whenever it is listed, whatever its weight.
    #[default]
    Literal,
    /// A coding is accepted only when listed with a weight above zero.
    QualityAware,
}

/// Parses an `Accept-Encoding` value into `(name, quality)` pairs, in header order.
///
/// Unparseable or missing weights fall back to [`DEFAULT_QUALITY`] rather than
/// rejecting the header. An empty value yields an empty list.
///
/// # Examples
///
/// ```
/// use filedrop::http::encoding::parse_accepted_encodings;
///
/// let parsed = parse_accepted_encodings("gzip;q=0.8, br, identity;q=oops");
/// let names: Vec<_> = parsed.iter().map(|e| e.name.as_str()).collect();
/// assert_eq!(names, ["gzip", "br", "identity"]);
/// assert_eq!(parsed[0].quality, 0.8);
/// assert_eq!(parsed[2].quality, 1.0);
/// ```
pub fn parse_accepted_encodings(value: &str) -> Vec<AcceptedEncoding> {
    value
        .split(',')
        .filter_map(|token| {
            let mut parts = token.trim().split(';');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }

            let quality = parts
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
                .map_or(DEFAULT_QUALITY, |(_, raw)| parse_quality(raw));

            Some(AcceptedEncoding {
                name: name.to_owned(),
                quality,
            })
        })
        .collect()
}

fn parse_quality(raw: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(q) if q.is_finite() => q.clamp(0.0, 1.0),
        _ => DEFAULT_QUALITY,
    }
}

/// Returns `true` if `name` is among `encodings` (ASCII case-insensitive).
pub fn accepts(encodings: &[AcceptedEncoding], name: &str, gate: EncodingGate) -> bool {
    encodings.iter().any(|encoding| {
        encoding.name.eq_ignore_ascii_case(name)
            && match gate {
                EncodingGate::Literal => true,
                EncodingGate::QualityAware => encoding.quality > 0.0,
            }
    })
}
