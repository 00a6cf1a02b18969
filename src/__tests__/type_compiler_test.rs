/**
 * @file type_compiler_test.rs
 * @brief Tests for lazy compilation of parsed declarations
 *
 * This test file covers:
 * - Pointer and array suffix composition
 * - Struct layouts and member lookups
 * - Enum and flag constants
 * - Memoization and reset
 */
use std::sync::Arc;

use crate::declarations::{Attr, Compiled, Member, Namespace};
use crate::ffi::error::AnnotateError;
use crate::ffi::symbols::SymbolTable;
use crate::parser::AnnotationParser;
use crate::types::native::{NativeAttr, NativeType};
use crate::types::primitive::Primitive;

const HEADER: &str = "
/* @struct Packet
 * @member uint8 kind
 * @member uint32 length
 * @member uint16 checksum
 * @member Header header
 */

/* @struct Header
 * @member uint8[4] magic
 * @member uint64 stamp
 */

/* @struct List
 * @member int32 value
 * @member List* next
 * @member List** slots
 */

/* @enum Level
 * @type int16
 * @member LOW (-1)
 * @member MID 0
 * @member HIGH (MID + 1)
 */

/* @flags Access
 * @type uint8
 * @flag READ 1
 * @flag WRITE (READ << 1)
 * @flag ALL (READ | WRITE)
 */

/* @typedef packet_t
 * @from_type Packet
 */

/* @typedef byte_ptr
 * @from_type uint8*
 */

/* @variable level
 * @type Level
 */
";

fn namespace() -> Namespace {
    let mut parser = AnnotationParser::new(Arc::new(SymbolTable::new()));
    parser.parse_str(HEADER).unwrap();
    parser.into_namespace()
}

fn prim(primitive: Primitive) -> NativeType {
    NativeType::Primitive(primitive)
}

#[test]
fn test_suffix_shapes() {
    let mut ns = namespace();
    let cases = [
        ("int32*", prim(Primitive::Int32).pointer_to()),
        ("int32[4]", prim(Primitive::Int32).array_of(4)),
        ("int32*[4]", prim(Primitive::Int32).pointer_to().array_of(4)),
        ("int32[4]*", prim(Primitive::Int32).array_of(4).pointer_to()),
        ("uint8**", prim(Primitive::UInt8).pointer_to().pointer_to()),
        ("double[2][3]*", prim(Primitive::Double).array_of(2).array_of(3).pointer_to()),
        ("void*", NativeType::Void.pointer_to()),
        ("byte_ptr[2]", prim(Primitive::UInt8).pointer_to().array_of(2)),
    ];
    for (name, expected) in cases {
        assert_eq!(ns.native_type(name).unwrap(), expected, "{}", name);
    }
    assert_ne!(
        ns.native_type("int32*[4]").unwrap(),
        ns.native_type("int32[4]*").unwrap()
    );
}

#[test]
fn test_struct_layout_with_forward_reference() {
    let mut ns = namespace();
    let packet = ns.native_type("Packet").unwrap();
    let layout = packet.as_struct().unwrap();

    let offsets: Vec<(&str, usize)> = layout
        .fields
        .iter()
        .map(|field| (field.name.as_str(), field.offset))
        .collect();
    assert_eq!(
        offsets,
        vec![("kind", 0), ("length", 4), ("checksum", 8), ("header", 16)]
    );
    assert_eq!(packet.size(), 32);
    assert_eq!(packet.align(), 8);

    // the forward reference compiled Header on the way
    assert!(ns.get("Header").unwrap().is_compiled());
}

#[test]
fn test_member_lookup_falls_through_to_native() {
    let mut ns = namespace();
    let packet = ns.compile("Packet").unwrap();
    assert_eq!(
        packet.attr("checksum"),
        Some(Attr::Member(Member::TypeName("uint16")))
    );
    assert_eq!(packet.attr("size"), Some(Attr::Native(NativeAttr::Size(32))));
    assert_eq!(packet.attr("align"), Some(Attr::Native(NativeAttr::Align(8))));
    assert_eq!(packet.attr("missing"), None);

    let bare = ns.compile_unwrap("Packet").unwrap();
    match bare.attr("length") {
        Some(Attr::Native(NativeAttr::Field(field))) => assert_eq!(field.offset, 4),
        other => panic!("unexpected attribute {:?}", other),
    }
}

#[test]
fn test_struct_instance_roundtrip() {
    let mut ns = namespace();
    let mut packet = ns.compile("packet_t").unwrap().instantiate().unwrap();
    packet.set_field("length", 1500u32).unwrap();
    packet.set_field("kind", 7u8).unwrap();

    let mut view = packet.view();
    let mut header = view.field("header").unwrap();
    let mut magic = header.field("magic").unwrap();
    magic.index(3).unwrap().set(0x7fu8).unwrap();

    assert_eq!(packet.bytes()[16 + 3], 0x7f);
    assert_eq!(packet.field("length").unwrap().as_u64(), Some(1500));
    assert_eq!(packet.field("kind").unwrap().as_u64(), Some(7));
}

#[test]
fn test_self_referential_list() {
    let mut ns = namespace();
    let list = ns.native_type("List").unwrap();
    let layout = list.as_struct().unwrap();
    let opaque = NativeType::Opaque("List".to_string());
    assert_eq!(layout.field("next").unwrap().ty, opaque.clone().pointer_to());
    assert_eq!(layout.field("slots").unwrap().ty, opaque.pointer_to().pointer_to());

    // outside its own compilation a pointer sees the complete struct
    let pointer = ns.native_type("List*").unwrap();
    assert!(pointer.element().unwrap().ptr_eq(&list));
}

#[test]
fn test_enum_and_flags() {
    let mut ns = namespace();
    let level = ns.compile("Level").unwrap();
    assert_eq!(level.native_type(), Some(&prim(Primitive::Int16)));
    let wrapper = level.as_wrapper().unwrap();
    assert_eq!(wrapper.constant("LOW"), Some(-1));
    assert_eq!(wrapper.constant("HIGH"), Some(1));

    let access = ns.compile("Access").unwrap();
    assert_eq!(access.attr("ALL"), Some(Attr::Member(Member::Constant(3))));
    assert_eq!(access.attr("size"), Some(Attr::Native(NativeAttr::Size(1))));

    let levels = ns.compile("Level[3]").unwrap();
    assert_eq!(levels.as_wrapper().unwrap().constant("MID"), Some(0));
    assert_eq!(levels.native_type().unwrap().size(), 6);
}

#[test]
fn test_memoization_and_reset() {
    let mut ns = namespace();
    let first = ns.compile("Packet").unwrap();
    assert!(first.ptr_eq(&ns.compile("Packet").unwrap()));
    assert!(first.ptr_eq(&ns.compile("Packet").unwrap()));

    ns.reset("Packet").unwrap();
    let second = ns.compile("Packet").unwrap();
    assert!(!first.ptr_eq(&second));
    assert!(second.ptr_eq(&ns.compile("Packet").unwrap()));

    // Header was not reset, so both Packet layouts share it
    let header_in = |compiled: &Compiled| {
        compiled.native_type().unwrap().as_struct().unwrap().field("header").unwrap().ty.clone()
    };
    assert!(header_in(&first).ptr_eq(&header_in(&second)));

    ns.reset_all();
    let third = ns.compile("Packet").unwrap();
    assert!(!header_in(&second).ptr_eq(&header_in(&third)));
}

#[test]
fn test_variable_is_not_a_type() {
    let mut ns = namespace();
    assert!(matches!(ns.compile("level"), Err(AnnotateError::Usage { .. })));
    assert!(matches!(ns.compile("level[2]"), Err(AnnotateError::Usage { .. })));
    assert_eq!(ns.variable_type("level").unwrap(), prim(Primitive::Int16));
    assert!(matches!(
        ns.value("level"),
        Err(AnnotateError::SymbolNotFound { .. })
    ));
}

#[test]
fn test_unknown_names() {
    let mut ns = namespace();
    for name in ["Unknown", "Unknown*", "Unknown[2]", "int33"] {
        assert!(
            matches!(ns.compile(name), Err(AnnotateError::NameResolution { .. })),
            "{}",
            name
        );
    }
}
