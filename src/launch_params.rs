//! Command-line launch parameters and URL query inspection.

use std::path::PathBuf;

/// Parsed process arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// URL the receiver page was opened with; its query may enable debug mode.
    pub page_url: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl LaunchParams {
    /// Accepts `--config <path>` and one positional page URL.
    pub fn from_args<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut params = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                params.config_path = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--config=") {
                params.config_path = Some(PathBuf::from(path));
            } else if arg.starts_with("--") {
                return Err(format!("unknown option {arg}"));
            } else if params.page_url.is_none() {
                params.page_url = Some(arg);
            } else {
                return Err(format!("unexpected argument {arg}"));
            }
        }
        Ok(params)
    }
}

/// Whether `url` carries `debug=true` in its query string.
pub fn debug_requested(url: &str) -> bool {
    query_param(url, "debug").is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// First decoded value of `name` in the query part of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    let (_, query) = without_fragment.split_once('?')?;
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key)?;
            if key != name {
                return None;
            }
            decode_component(value)
        })
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{debug_requested, query_param, LaunchParams};

    #[test]
    fn test_debug_flag_detection() {
        assert!(debug_requested("https://receiver.example/index.html?debug=true"));
        assert!(debug_requested("https://cdn/a.m3u8?token=x&debug=TRUE#t=10"));
        assert!(!debug_requested("https://cdn/a.m3u8?debug=false"));
        assert!(!debug_requested("https://cdn/a.m3u8#debug=true"));
        assert!(!debug_requested("https://cdn/a.m3u8"));
    }

    #[test]
    fn test_query_values_are_percent_decoded() {
        assert_eq!(
            query_param("https://x/?name=hello%20world&b=1", "name").as_deref(),
            Some("hello world")
        );
        assert_eq!(query_param("https://x/?flag", "flag").as_deref(), Some(""));
        assert_eq!(query_param("https://x/?a=1", "b"), None);
    }

    #[test]
    fn test_args_parse_config_and_page_url() {
        let params = LaunchParams::from_args(
            ["--config", "/tmp/r.toml", "https://receiver/?debug=true"]
                .map(ToString::to_string),
        )
        .expect("args should parse");
        assert_eq!(params.config_path, Some(PathBuf::from("/tmp/r.toml")));
        assert_eq!(params.page_url.as_deref(), Some("https://receiver/?debug=true"));

        assert!(LaunchParams::from_args(["--config".to_string()]).is_err());
        assert!(LaunchParams::from_args(["--verbose".to_string()]).is_err());
    }
}
