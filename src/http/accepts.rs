//! Content negotiation over the `Accept` header.

use mime::Mime;

/// The media ranges a client accepts, most preferred first.
///
/// Ranges with `q=0` are dropped. Equal weights keep header order. A request
/// without an `Accept` header accepts anything.
#[derive(Debug, Clone)]
pub struct Accepts {
    ranges: Vec<(Mime, f32)>,
    any: bool,
}

impl Accepts {
    pub fn parse(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self {
                ranges: Vec::new(),
                any: true,
            };
        };

        let mut ranges: Vec<(Mime, f32)> = header
            .split(',')
            .filter_map(|part| part.trim().parse::<Mime>().ok())
            .map(|range| {
                let q = range
                    .get_param("q")
                    .and_then(|q| q.as_str().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (range, q)
            })
            .filter(|(_, q)| *q > 0.0)
            .collect();
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        Self { ranges, any: false }
    }

    /// Picks the offer the client prefers most, or `None` if it accepts none
    /// of them. With no `Accept` header the first offer wins.
    ///
    /// Offers are full media types (`text/html`) or the shorthands `html`,
    /// `json`, `text`.
    pub fn accepts<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        if self.any {
            return offers.first().copied();
        }
        self.ranges.iter().find_map(|(range, _)| {
            offers.iter().copied().find(|offer| {
                expand(offer)
                    .parse::<Mime>()
                    .is_ok_and(|offer| matches(range, &offer))
            })
        })
    }

    pub fn html(&self) -> bool {
        self.accepts(&["html"]).is_some()
    }

    pub fn json(&self) -> bool {
        self.accepts(&["json"]).is_some()
    }

    /// Accepted ranges in preference order.
    pub fn ranges(&self) -> impl Iterator<Item = &Mime> {
        self.ranges.iter().map(|(range, _)| range)
    }
}

fn expand(offer: &str) -> &str {
    match offer {
        "html" => "text/html",
        "json" => "application/json",
        "text" => "text/plain",
        other => other,
    }
}

fn matches(range: &Mime, offer: &Mime) -> bool {
    let type_ok = range.type_() == mime::STAR || range.type_() == offer.type_();
    let subtype_ok = range.subtype() == mime::STAR || range.subtype() == offer.subtype();
    type_ok && subtype_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_accepts_first_offer() {
        let accepts = Accepts::parse(None);
        assert_eq!(accepts.accepts(&["json", "html"]), Some("json"));
        assert!(accepts.html());
    }

    #[test]
    fn picks_by_quality() {
        let accepts = Accepts::parse(Some("text/plain;q=0.5, text/html"));
        assert_eq!(accepts.accepts(&["text", "html"]), Some("html"));
    }

    #[test]
    fn wildcards() {
        let accepts = Accepts::parse(Some("text/*"));
        assert!(accepts.html());
        assert!(!accepts.json());

        let anything = Accepts::parse(Some("*/*"));
        assert_eq!(anything.accepts(&["image/png"]), Some("image/png"));
    }

    #[test]
    fn zero_quality_is_refused() {
        let accepts = Accepts::parse(Some("text/html;q=0, application/json"));
        assert!(!accepts.html());
        assert!(accepts.json());
    }

    #[test]
    fn garbage_ranges_are_skipped() {
        let accepts = Accepts::parse(Some("nonsense, application/json"));
        assert_eq!(accepts.ranges().count(), 1);
        assert!(accepts.json());
    }
}
