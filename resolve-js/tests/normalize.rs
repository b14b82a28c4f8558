use resolve_js::codes;
use resolve_js::ImportMap;
use resolve_js::InvalidDocument;
use resolve_js::Severity;
use serde_json::json;
use url::Url;

fn base() -> Url {
  Url::parse("https://example.com/app/importmap.json").unwrap()
}

#[test]
fn rejects_non_object_documents() {
  for document in [json!([]), json!("imports"), json!(null), json!(3)] {
    let err = ImportMap::normalize(&document, &base()).unwrap_err();
    assert!(matches!(err, InvalidDocument::NotAnObject { .. }), "{document}");
  }
  assert!(matches!(
    ImportMap::from_json("{ not json", &base()),
    Err(InvalidDocument::Json(_))
  ));
}

#[test]
fn empty_document_normalizes_to_empty_map() {
  let normalized = ImportMap::normalize(&json!({}), &base()).unwrap();
  assert!(normalized.import_map.is_empty());
  assert!(normalized.diagnostics.is_empty());
}

#[test]
fn resolves_keys_addresses_and_scopes_against_base() {
  let normalized = ImportMap::normalize(
    &json!({
      "imports": {
        "lodash": "./vendor/lodash.js",
        "./local/": "/shared/local/",
        "cdn": "https://cdn.test/pkg.js"
      },
      "scopes": {
        "./pkg/": { "dep": "../dep.js" }
      }
    }),
    &base(),
  )
  .unwrap();
  assert!(normalized.diagnostics.is_empty());

  let map = normalized.import_map;
  assert_eq!(
    map.imports().get("lodash").map(Url::as_str),
    Some("https://example.com/app/vendor/lodash.js")
  );
  assert_eq!(
    map.imports().get("https://example.com/app/local/").map(Url::as_str),
    Some("https://example.com/shared/local/")
  );
  assert_eq!(
    map.imports().get("cdn").map(Url::as_str),
    Some("https://cdn.test/pkg.js")
  );

  assert_eq!(map.scopes().len(), 1);
  let scope = &map.scopes()[0];
  assert_eq!(scope.prefix.as_str(), "https://example.com/app/pkg/");
  // Scope bodies resolve against the document, not the scope prefix.
  assert_eq!(
    scope.imports.get("dep").map(Url::as_str),
    Some("https://example.com/dep.js")
  );
}

#[test]
fn trailing_slash_mismatch_is_dropped_with_warning() {
  let normalized = ImportMap::normalize(
    &json!({ "imports": { "lib/": "/dest", "ok/": "/ok/" } }),
    &base(),
  )
  .unwrap();

  assert!(normalized.import_map.imports().get("lib/").is_none());
  assert!(normalized.import_map.imports().get("ok/").is_some());
  assert_eq!(normalized.diagnostics.len(), 1);
  let diagnostic = &normalized.diagnostics[0];
  assert_eq!(diagnostic.code, codes::TRAILING_SLASH_MISMATCH);
  assert_eq!(diagnostic.severity, Severity::Warning);
  assert_eq!(diagnostic.path, "imports[\"lib/\"]");

  // A dropped entry does not participate in resolution.
  assert!(normalized.import_map.resolve("lib/x.js", Some(&base())).is_err());
}

#[test]
fn invalid_entries_are_dropped_without_aborting() {
  let normalized = ImportMap::normalize(
    &json!({
      "imports": {
        "": "/empty.js",
        "number": 1,
        "broken": "https://[broken",
        "fine": "/fine.js"
      },
      "scopes": {
        "/scope/": "not an object",
        "https://[bad/": { "x": "/x.js" },
        "/good/": { "y": "/y.js", "z": null }
      }
    }),
    &base(),
  )
  .unwrap();

  let codes: Vec<_> = normalized.diagnostics.iter().map(|d| d.code).collect();
  assert!(codes.contains(&codes::EMPTY_SPECIFIER_KEY));
  assert!(codes.contains(&codes::ADDRESS_NOT_STRING));
  assert!(codes.contains(&codes::ADDRESS_NOT_URL));
  assert!(codes.contains(&codes::SCOPE_NOT_OBJECT));
  assert!(codes.contains(&codes::SCOPE_PREFIX_NOT_URL));
  assert_eq!(normalized.diagnostics.len(), 6);

  let map = normalized.import_map;
  assert_eq!(map.imports().len(), 1);
  assert!(map.imports().get("fine").is_some());
  assert_eq!(map.scopes().len(), 1);
  assert_eq!(map.scopes()[0].imports.len(), 1);
}

#[test]
fn non_object_members_are_ignored_with_warning() {
  let normalized =
    ImportMap::normalize(&json!({ "imports": ["a"], "scopes": 4 }), &base()).unwrap();
  assert!(normalized.import_map.is_empty());
  assert_eq!(normalized.diagnostics.len(), 2);
  assert!(normalized
    .diagnostics
    .iter()
    .all(|d| d.code == codes::TOP_LEVEL_MEMBER_NOT_OBJECT));
}

#[test]
fn keys_normalizing_to_the_same_url_are_reported() {
  let normalized = ImportMap::normalize(
    &json!({ "imports": { "./a.js": "/one.js", "/app/a.js": "/two.js" } }),
    &base(),
  )
  .unwrap();
  assert_eq!(normalized.import_map.imports().len(), 1);
  assert_eq!(normalized.diagnostics.len(), 1);
  assert_eq!(normalized.diagnostics[0].code, codes::DUPLICATE_KEY);
}

#[test]
fn mappings_are_sorted_longest_key_first() {
  let normalized = ImportMap::normalize(
    &json!({
      "imports": { "a/": "/x/", "a/b/": "/y/", "b/": "/z/", "a/b/c/": "/w/" },
      "scopes": { "/": {}, "/pkg/": {}, "/pkg/nested/": {} }
    }),
    &base(),
  )
  .unwrap();

  let keys: Vec<_> = normalized
    .import_map
    .imports()
    .entries()
    .iter()
    .map(|e| e.key.as_str())
    .collect();
  assert_eq!(keys, ["a/b/c/", "a/b/", "a/", "b/"]);

  let prefixes: Vec<_> = normalized
    .import_map
    .scopes()
    .iter()
    .map(|s| s.prefix.path())
    .collect();
  assert_eq!(prefixes, ["/pkg/nested/", "/pkg/", "/"]);
}

#[test]
fn document_round_trips_relative_to_its_location() {
  let normalized = ImportMap::normalize(
    &json!({
      "imports": { "dep": "./vendor/dep.js", "cdn/": "https://cdn.test/" },
      "scopes": { "./pkg/": { "dep": "./pkg/dep.js" } }
    }),
    &base(),
  )
  .unwrap();

  let document = normalized.import_map.to_document(Some(&base()));
  assert_eq!(
    document,
    json!({
      "imports": { "dep": "./vendor/dep.js", "cdn/": "https://cdn.test/" },
      "scopes": { "./pkg/": { "dep": "./pkg/dep.js" } }
    })
  );

  let reparsed = ImportMap::normalize(&document, &base()).unwrap();
  assert_eq!(reparsed.import_map, normalized.import_map);

  let absolute = serde_json::to_value(&normalized.import_map).unwrap();
  assert_eq!(
    absolute["imports"]["dep"],
    json!("https://example.com/app/vendor/dep.js")
  );
}
