//! # Test Configuration
//!
//! Shared fixtures for the integration tests: a symbol table of host
//! functions and data, and scratch directories holding annotated headers.

#![allow(dead_code)]

use annotatec::SymbolTable;
use std::env;
use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};

/// Test environment configuration
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Root of the scratch directories
    pub scratch_root: PathBuf,
    /// Log level for tests
    pub log_level: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            scratch_root: env::temp_dir().join(format!("annotatec-tests-{}", std::process::id())),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        }
    }
}

impl TestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty directory named after the test
    pub fn scratch_dir(&self, test_name: &str) -> PathBuf {
        let dir = self.scratch_root.join(test_name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch directory");
        dir
    }
}

pub const VECTOR_HEADER: &str = "\
#pragma once
#include <stdint.h>

/* @struct Vec3
 * @member float x
 * @member float y
 * @member float z
 */
typedef struct { float x, y, z; } Vec3;

/* @function vec3_dot
 * @return float
 * @argument Vec3*
 * @argument Vec3*
 */
float vec3_dot(const Vec3 *a, const Vec3 *b);

/* @function vec3_scale
 * @return void
 * @argument Vec3*
 * @argument float
 */
void vec3_scale(Vec3 *v, float factor);
";

pub const COUNTER_HEADER: &str = "\
/* @enum Direction
 * @member UP 1
 * @member DOWN (-UP)
 */

/* @function counter_step
 * @return int64
 * @argument Direction
 */
int64_t counter_step(int direction);

/* @variable counter_value
 * @type int64
 */
extern int64_t counter_value;
";

#[repr(C)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

extern "C" fn vec3_dot(a: *const Vec3, b: *const Vec3) -> f32 {
    let (a, b) = unsafe { (&*a, &*b) };
    a.x * b.x + a.y * b.y + a.z * b.z
}

extern "C" fn vec3_scale(v: *mut Vec3, factor: f32) {
    let v = unsafe { &mut *v };
    v.x *= factor;
    v.y *= factor;
    v.z *= factor;
}

pub static mut COUNTER_VALUE: i64 = 0;

extern "C" fn counter_step(direction: i32) -> i64 {
    unsafe {
        COUNTER_VALUE += direction as i64;
        COUNTER_VALUE
    }
}

/// Host implementations of every function and variable in the headers
pub fn fixture_symbols() -> SymbolTable {
    let mut table = SymbolTable::new();
    table
        .insert_function("vec3_dot", vec3_dot as *const c_void)
        .insert_function("vec3_scale", vec3_scale as *const c_void)
        .insert_function("counter_step", counter_step as *const c_void)
        .insert_data(
            "counter_value",
            unsafe { std::ptr::addr_of_mut!(COUNTER_VALUE) }.cast(),
        );
    table
}

/// Write both headers plus a non-header file into `dir`
pub fn write_headers(dir: &Path) {
    fs::write(dir.join("vector.h"), VECTOR_HEADER).expect("write vector.h");
    fs::write(dir.join("counter.h"), COUNTER_HEADER).expect("write counter.h");
    fs::write(dir.join("README.md"), "/* @typedef ignored\n * @from_type int8\n */\n")
        .expect("write README.md");
}
