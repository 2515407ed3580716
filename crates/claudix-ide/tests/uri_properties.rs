//! Property-based tests for URI construction
//!
//! **Feature: Cross-boundary URIs**
//!
//! A URI built from components reads back exactly those components, and its
//! string form parses back to the same value.

use claudix_ide::*;
use proptest::prelude::*;

fn arb_scheme() -> impl Strategy<Value = String> {
    r"[a-z][a-z0-9+.\-]{0,9}"
}

fn arb_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(r"[A-Za-z0-9 _%.:\-]{1,8}", 1..4)
}

fn arb_path() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        arb_segments().prop_map(|segments| format!("/{}", segments.join("/"))),
        arb_segments().prop_map(|segments| segments.join("/")),
    ]
}

/// Relative paths cannot follow a `//authority` marker
fn representable(components: &UriComponents) -> bool {
    let path = components.path.as_deref().unwrap_or_default();
    let writes_authority = components.authority.as_deref().is_some_and(|a| !a.is_empty())
        || components.scheme.as_deref() == Some("file");
    path.is_empty() || path.starts_with('/') || !writes_authority
}

fn arb_components() -> impl Strategy<Value = UriComponents> {
    (
        arb_scheme(),
        r"([a-z0-9.\-]{1,12}(:[0-9]{1,5})?)?",
        arb_path(),
        r"[A-Za-z0-9=&%# ]{0,12}",
        r"[A-Za-z0-9#? ]{0,8}",
    )
        .prop_map(|(scheme, authority, path, query, fragment)| UriComponents {
            scheme: Some(scheme),
            authority: Some(authority),
            path: Some(path),
            query: Some(query),
            fragment: Some(fragment),
        })
}

proptest! {
    /// Components read back unchanged
    #[test]
    fn prop_component_readback(components in arb_components()) {
        prop_assume!(representable(&components));
        let uri = Uri::from_components(&components).unwrap();
        prop_assert_eq!(Some(uri.scheme().to_string()), components.scheme.clone());
        prop_assert_eq!(Some(uri.authority().to_string()), components.authority.clone());
        prop_assert_eq!(Some(uri.path().to_string()), components.path.clone());
        prop_assert_eq!(Some(uri.query().to_string()), components.query.clone());
        prop_assert_eq!(Some(uri.fragment().to_string()), components.fragment.clone());
        prop_assert_eq!(uri.to_components(), components);
    }

    /// The string form parses back to an equal URI
    #[test]
    fn prop_display_parse_inverse(components in arb_components()) {
        match Uri::from_components(&components) {
            Ok(uri) => {
                let parsed = Uri::parse(&uri.to_string()).unwrap();
                prop_assert_eq!(parsed, uri);
            }
            Err(e) => {
                prop_assert!(!representable(&components));
                prop_assert!(matches!(e, IdeError::InvalidUri(_)));
            }
        }
    }

    /// Relative paths are rejected exactly when an authority marker is written
    #[test]
    fn prop_relative_path_with_authority_rejected(
        segments in arb_segments(),
        authority in r"[a-z0-9.\-]{1,12}",
    ) {
        let relative = segments.join("/");
        let with_authority = Uri::from_components(&UriComponents {
            scheme: Some("https".to_string()),
            authority: Some(authority),
            path: Some(relative.clone()),
            ..Default::default()
        });
        prop_assert!(matches!(with_authority, Err(IdeError::InvalidUri(_))));

        let file = Uri::from_components(&UriComponents {
            scheme: Some("file".to_string()),
            path: Some(relative.clone()),
            ..Default::default()
        });
        prop_assert!(matches!(file, Err(IdeError::InvalidUri(_))));

        let untitled = Uri::from_components(&UriComponents {
            scheme: Some("untitled".to_string()),
            path: Some(relative),
            ..Default::default()
        });
        prop_assert!(untitled.is_ok());
    }

    /// Omitted optional parts default to empty
    #[test]
    fn prop_optional_parts_default_empty(scheme in arb_scheme(), path in arb_path()) {
        prop_assume!(scheme != "file" || path.is_empty() || path.starts_with('/'));
        let uri = Uri::from_components(&UriComponents {
            scheme: Some(scheme),
            path: Some(path),
            ..Default::default()
        })
        .unwrap();
        prop_assert_eq!(uri.authority(), "");
        prop_assert_eq!(uri.query(), "");
        prop_assert_eq!(uri.fragment(), "");
    }

    /// Without a scheme construction always fails
    #[test]
    fn prop_missing_scheme_rejected(path in arb_path()) {
        let result = Uri::from_components(&UriComponents {
            path: Some(path),
            ..Default::default()
        });
        prop_assert!(matches!(result, Err(IdeError::InvalidUri(_))));
    }
}
