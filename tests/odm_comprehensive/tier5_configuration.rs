//! Tier 5: Configuration

use crate::test_utils::Blog;
use docmap::{
    doc, MapperConfig, SaveOutcome, SkipMode, StoreCall, StoredQuery, Value, CONFIG_FILE_NAME,
};
use tempfile::TempDir;

#[test]
fn tier5_default_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    MapperConfig::write_default_if_missing(&path).unwrap();

    let mut config = MapperConfig::from_file(&path).unwrap();
    assert_eq!(config, MapperConfig::default());

    config.default_database = "blog".to_string();
    config.skip_mode = SkipMode::LegacyAlias;
    config.write_to_file(&path).unwrap();
    MapperConfig::write_default_if_missing(&path).unwrap();

    let reloaded = MapperConfig::from_file(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn tier5_malformed_file_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "parallel_batches = \"often\"").unwrap();

    let err = MapperConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains(CONFIG_FILE_NAME));
}

#[test]
fn tier5_default_database_places_collections() {
    let blog = Blog::with_config(MapperConfig::with_database("blog"));
    let ann = blog.author("Ann");

    assert_eq!(ann.namespace(), &blog.ns("author"));
    assert_eq!(blog.ns("author").database, "blog");
    assert_eq!(blog.store.documents(&blog.ns("author")).len(), 1);
    let reference = blog.mapper.reference(&ann).unwrap();
    assert_eq!(reference.database(), Some("blog"));
}

#[test]
fn tier5_custom_identity_field_end_to_end() {
    let config = MapperConfig {
        identity_field: "key".to_string(),
        ..MapperConfig::default()
    };
    let blog = Blog::with_config(config);
    let ann = blog.author("Ann");
    let post = blog.post("Hello", &ann);

    let key = ann.get("key").cloned().unwrap();
    assert!(ann.get("_id").is_none());
    let stored = blog.stored("posts", post.get("key").unwrap());
    let reference = stored.get("author").and_then(Value::as_reference).unwrap();
    assert_eq!(reference.id(), Some(&key));

    let mut loaded = blog.mapper.find("Post", doc! {}).unwrap().next().unwrap();
    blog.mapper.resolve(&mut loaded).unwrap();
    let author = loaded.get("author").and_then(Value::as_record).unwrap();
    assert_eq!(author.get("key"), Some(&key));
}

#[test]
fn tier5_legacy_alias_skip_mode() {
    let blog = Blog::with_config(MapperConfig {
        skip_mode: SkipMode::LegacyAlias,
        ..MapperConfig::default()
    });
    let ann = blog.author("Ann");
    for title in ["p1", "p2", "p3"] {
        blog.post(title, &ann);
    }

    let cursor = blog
        .mapper
        .query("Post", StoredQuery::default().limit(2).skip(1))
        .unwrap();
    let mut shelf = blog.mapper.create("Tag").unwrap();
    shelf
        .set("label", "s")
        .set("posts", cursor.dynamic_reference().unwrap());
    blog.save_new(&mut shelf);
    blog.store.clear_calls();

    blog.mapper.resolve(&mut shelf).unwrap();
    match &blog.store.calls()[..] {
        [StoreCall::FindByQuery { query, .. }] => {
            assert_eq!(query.limit, 2);
            assert_eq!(query.skip, 0);
        }
        other => panic!("unexpected calls {:?}", other),
    }
    let posts = shelf.get("posts").and_then(Value::as_result_set).unwrap();
    let titles: Vec<_> = posts.iter().filter_map(|r| r.get("title")).collect();
    assert_eq!(titles, vec![&Value::from("p1"), &Value::from("p2")]);

    // The stored descriptor keeps its skip
    assert_eq!(blog.mapper.save(&mut shelf).unwrap(), SaveOutcome::Unchanged);
}

#[test]
fn tier5_parallel_batches_match_sequential() {
    fn build(config: MapperConfig) -> Vec<Option<Value>> {
        let blog = Blog::with_config(config);
        let ann = blog.author("Ann");
        let bob = blog.author("Bob");
        let rust = blog.tag("rust");
        let mut post = blog.mapper.create("Post").unwrap();
        post.set("title", "t")
            .set("authors", vec![ann, bob])
            .set("tags", vec![rust]);
        blog.save_new(&mut post);
        blog.mapper.resolve(&mut post).unwrap();

        let mut names: Vec<Option<Value>> = post
            .get("authors")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .map(|v| v.as_record().and_then(|r| r.get("name")).cloned())
            .collect();
        names.push(
            post.get("tags")
                .and_then(Value::as_array)
                .and_then(|t| t[0].as_record())
                .and_then(|r| r.get("label"))
                .cloned(),
        );
        names
    }

    let sequential = build(MapperConfig::default());
    let parallel = build(MapperConfig {
        parallel_batches: true,
        ..MapperConfig::default()
    });
    assert_eq!(sequential, parallel);
    assert_eq!(
        sequential,
        vec![
            Some(Value::from("Ann")),
            Some(Value::from("Bob")),
            Some(Value::from("rust"))
        ]
    );
}
