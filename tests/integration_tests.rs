//! # Integration Tests
//!
//! Drives the public API from header text to foreign calls, using host
//! functions registered in a `SymbolTable` in place of a shared library.

mod test_config;

use annotatec::{
    AnnotateError, AnnotationParser, LibraryConfig, LibraryLoader, Loader, LoaderConfig,
    NativeType, ParserConfig, Primitive, Source, Value, LIBRARY_PATH_ENV,
};
use std::sync::Arc;
use test_config::{fixture_symbols, write_headers, TestConfig, COUNTER_HEADER, VECTOR_HEADER};

fn loader(precompile: bool) -> Loader {
    Loader::with_resolver(
        Arc::new(fixture_symbols()),
        &[
            Source::Text(VECTOR_HEADER.to_string()),
            Source::Text(COUNTER_HEADER.to_string()),
        ],
        precompile,
    )
    .expect("loader from fixture headers")
}

#[test]
fn test_header_to_call() {
    let mut loader = loader(true);

    let vec3 = loader.get("Vec3").unwrap();
    let mut a = vec3.instantiate().unwrap();
    let mut b = vec3.instantiate().unwrap();
    for (field, (left, right)) in ["x", "y", "z"].iter().zip([(1.0, 4.0), (2.0, 5.0), (3.0, 6.0)]) {
        a.set_field(field, left).unwrap();
        b.set_field(field, right).unwrap();
    }

    let dot = loader.call("vec3_dot", &[a.address(), b.address()]).unwrap();
    assert_eq!(dot, Value::Float(32.0));

    loader.call("vec3_scale", &[a.address(), Value::Float(0.5)]).unwrap();
    assert_eq!(a.field("z").unwrap(), Value::Float(1.5));
}

#[test]
fn test_enum_argument_and_live_variable() {
    let mut loader = loader(false);
    let direction = loader.get("Direction").unwrap();
    let wrapper = direction.as_wrapper().unwrap();
    let up = wrapper.constant("UP").unwrap() as i64;
    let down = wrapper.constant("DOWN").unwrap() as i64;

    let mut counter = loader.value("counter_value").unwrap();
    counter.set(100i64).unwrap();

    loader.call("counter_step", &[Value::Int(up)]).unwrap();
    loader.call("counter_step", &[Value::Int(up)]).unwrap();
    let last = loader.call("counter_step", &[Value::Int(down)]).unwrap();

    assert_eq!(last, Value::Int(101));
    assert_eq!(counter.get().unwrap(), Value::Int(101));
}

#[test]
fn test_lazy_loader_compiles_on_demand() {
    let mut loader = loader(false);
    assert!(!loader.parser().namespace().get("vec3_dot").unwrap().is_compiled());
    loader.function("vec3_dot").unwrap();
    assert!(loader.parser().namespace().get("vec3_dot").unwrap().is_compiled());
    assert!(loader.parser().namespace().get("Vec3").unwrap().is_compiled());
}

#[test]
fn test_reference_builds_pointer_types() {
    let mut loader = loader(false);
    let pointer = loader.reference("Vec3", 1).unwrap();
    let pointer = pointer.native_type().unwrap();
    assert_eq!(pointer.size(), std::mem::size_of::<usize>());
    assert_eq!(pointer.element().unwrap().size(), 12);

    let double = loader.reference("int64", 2).unwrap();
    assert_eq!(
        double.native_type(),
        Some(&NativeType::Primitive(Primitive::Int64).pointer_to().pointer_to())
    );
}

#[test]
fn test_directory_sources() {
    let config = TestConfig::new();
    let dir = config.scratch_dir("directory_sources");
    write_headers(&dir);

    let mut parser = AnnotationParser::with_config(Arc::new(fixture_symbols()), ParserConfig::default());
    assert_eq!(parser.parse_sources(&[Source::from(dir.as_path())]).unwrap(), 6);
    assert!(!parser.namespace().contains("ignored"));
    parser.initialize_objects().unwrap();
}

#[test]
fn test_loader_config_file() {
    let config = TestConfig::new();
    let dir = config.scratch_dir("loader_config_file");
    let path = dir.join("loader.json");
    std::fs::write(
        &path,
        r#"{
            "library": {"name": "libmissing.so", "search_paths": ["/nonexistent/libmissing.so"]},
            "sources": ["include"],
            "precompile": false
        }"#,
    )
    .unwrap();

    let loaded = LoaderConfig::from_json_file(&path).unwrap();
    assert!(!loaded.precompile);
    assert!(loaded.parser.strict);

    if std::env::var(LIBRARY_PATH_ENV).is_err() {
        assert!(matches!(
            Loader::new(loaded),
            Err(AnnotateError::LibraryNotFound { .. })
        ));
    }
    assert!(matches!(
        LoaderConfig::from_json_file(dir.join("absent.json")),
        Err(AnnotateError::Io(_))
    ));
}

#[test]
fn test_missing_library_path() {
    if std::env::var(LIBRARY_PATH_ENV).is_ok() {
        return;
    }
    let result = LibraryLoader::with_config(LibraryConfig::with_path("/nonexistent/libnothing.so"));
    assert!(matches!(result, Err(AnnotateError::LibraryNotFound { .. })));
}

#[cfg(target_os = "linux")]
#[test]
fn test_process_symbols_from_libc() {
    let header = "\
/* @function strlen
 * @return size
 * @argument string
 */
/* @function abs
 * @return int
 * @argument int
 */
";
    let mut loader = Loader::with_resolver(
        LibraryLoader::this_process().into_shared(),
        &[Source::Text(header.to_string())],
        true,
    )
    .unwrap();
    assert_eq!(loader.call("strlen", &[Value::from("annotatec")]).unwrap(), Value::UInt(9));
    assert_eq!(loader.call("abs", &[Value::Int(-7)]).unwrap(), Value::Int(7));
}
