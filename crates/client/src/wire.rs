use adoption_insights_core::Page;
use serde::Deserialize;

/// Page response body: an envelope with an optional total, or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum PageBody<T> {
    Envelope {
        data: Vec<T>,
        #[serde(rename = "totalCount", default)]
        total_count: Option<usize>,
    },
    Bare(Vec<T>),
}

impl<T> PageBody<T> {
    pub(crate) fn into_page(self) -> Page<T> {
        match self {
            Self::Envelope { data, total_count } => Page::new(data, total_count),
            Self::Bare(data) => Page::new(data, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_total() {
        let body: PageBody<u32> = serde_json::from_str(r#"{"data":[1,2],"totalCount":5}"#).unwrap();
        assert_eq!(body.into_page(), Page::new(vec![1, 2], Some(5)));
    }

    #[test]
    fn test_envelope_without_total() {
        let body: PageBody<u32> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        let page = body.into_page();
        assert!(page.is_exhausted());
        assert_eq!(page.total_count, None);
    }

    #[test]
    fn test_bare_array() {
        let body: PageBody<u32> = serde_json::from_str("[7]").unwrap();
        assert_eq!(body.into_page(), Page::new(vec![7], None));
    }
}
