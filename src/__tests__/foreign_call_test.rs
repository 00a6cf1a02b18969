/**
 * @file foreign_call_test.rs
 * @brief Tests for calling annotated functions and reading variables
 *
 * Functions and variables are host symbols registered in a SymbolTable,
 * so no shared library is needed.
 */
use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::Arc;

use crate::declarations::Namespace;
use crate::ffi::error::AnnotateError;
use crate::ffi::symbols::SymbolTable;
use crate::parser::AnnotationParser;
use crate::types::buffers::Instance;
use crate::types::value::Value;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

extern "C" fn point_norm(point: *const Point) -> f64 {
    let point = unsafe { &*point };
    (point.x * point.x + point.y * point.y).sqrt()
}

extern "C" fn point_sum(point: Point) -> f64 {
    point.x + point.y
}

extern "C" fn point_make(x: f64, y: f64) -> Point {
    Point { x, y }
}

extern "C" fn greeting() -> *const c_char {
    b"hello\0".as_ptr() as *const c_char
}

extern "C" fn has_flag(flags: u8, flag: u8) -> bool {
    flags & flag == flag
}

static mut TICKS: u32 = 0;

extern "C" fn tick() {
    unsafe { TICKS += 1 };
}

const HEADER: &str = "
/* @struct Point
 * @member double x
 * @member double y
 */

/* @flags Access
 * @type uint8
 * @flag READ 1
 * @flag WRITE 2
 */

/* @function point_norm
 * @return double
 * @argument Point*
 */

/* @function point_sum
 * @return double
 * @argument Point
 */

/* @function point_make
 * @return Point
 * @argument double
 * @argument double
 */

/* @function greeting
 * @return string
 */

/* @function has_flag
 * @return bool
 * @argument Access
 * @argument Access
 */

/* @function tick
 * @return void
 */

/* @variable ticks
 * @type uint32
 */
";

fn namespace() -> Namespace {
    let mut table = SymbolTable::new();
    table
        .insert_function("point_norm", point_norm as *const c_void)
        .insert_function("point_sum", point_sum as *const c_void)
        .insert_function("point_make", point_make as *const c_void)
        .insert_function("greeting", greeting as *const c_void)
        .insert_function("has_flag", has_flag as *const c_void)
        .insert_function("tick", tick as *const c_void)
        .insert_data("ticks", unsafe { std::ptr::addr_of_mut!(TICKS) }.cast());

    let mut parser = AnnotationParser::new(Arc::new(table));
    parser.parse_str(HEADER).unwrap();
    parser.initialize_objects().unwrap();
    parser.into_namespace()
}

#[test]
fn test_struct_by_pointer() {
    let mut ns = namespace();
    let mut point = ns.compile("Point").unwrap().instantiate().unwrap();
    point.set_field("x", 3.0).unwrap();
    point.set_field("y", 4.0).unwrap();

    let norm = ns.function("point_norm").unwrap();
    assert_eq!(norm.call(&[point.address()]).unwrap(), Value::Float(5.0));
}

#[test]
fn test_struct_by_value() {
    let mut ns = namespace();
    let mut point = ns.compile("Point").unwrap().instantiate().unwrap();
    point.set_field("x", 1.25).unwrap();
    point.set_field("y", 2.5).unwrap();

    let sum = ns.function("point_sum").unwrap();
    assert_eq!(sum.call(&[point.to_value()]).unwrap(), Value::Float(3.75));
    assert!(matches!(
        sum.call(&[Value::Bytes(vec![0; 3])]),
        Err(AnnotateError::ValueMismatch { .. })
    ));
}

#[test]
fn test_struct_return() {
    let mut ns = namespace();
    let make = ns.function("point_make").unwrap();
    let Value::Bytes(bytes) = make.call(&[Value::Float(-1.0), Value::Float(8.0)]).unwrap() else {
        panic!("struct results come back as bytes");
    };
    assert_eq!(bytes.len(), std::mem::size_of::<Point>());

    let point_type = ns.native_type("Point").unwrap();
    let mut point = Instance::from_value(point_type, &Value::Bytes(bytes)).unwrap();
    assert_eq!(point.field("x").unwrap(), Value::Float(-1.0));
    assert_eq!(point.field("y").unwrap(), Value::Float(8.0));
}

#[test]
fn test_string_return() {
    let mut ns = namespace();
    let greeting = ns.function("greeting").unwrap();
    assert_eq!(greeting.call(&[]).unwrap().as_str(), Some("hello"));
}

#[test]
fn test_flags_argument() {
    let mut ns = namespace();
    let read = ns.compile("Access").unwrap().as_wrapper().unwrap().constant("READ").unwrap();
    let write = ns.compile("Access").unwrap().as_wrapper().unwrap().constant("WRITE").unwrap();
    let has_flag = ns.function("has_flag").unwrap();

    let both = Value::UInt((read | write) as u64);
    assert_eq!(
        has_flag.call(&[both, Value::UInt(write as u64)]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        has_flag.call(&[Value::UInt(read as u64), Value::UInt(write as u64)]).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn test_void_function_updates_variable() {
    let mut ns = namespace();
    let mut ticks = ns.value("ticks").unwrap();
    ticks.set(10u32).unwrap();

    let tick = ns.function("tick").unwrap();
    assert_eq!(tick.call(&[]).unwrap(), Value::Void);
    assert_eq!(tick.call(&[]).unwrap(), Value::Void);

    assert_eq!(ticks.get().unwrap(), Value::UInt(12));
    assert_eq!(ns.value("ticks").unwrap().address(), ticks.address());
}
