//! FFI bindings for Alignify Core
//!
//! This module provides C-compatible functions for calling the engine from
//! other languages (mobile hosts in particular). All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `alignify_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::pipeline::AlignmentEngine;
use crate::template::PoseTemplate;
use crate::types::LandmarkFrame;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque handle to an AlignmentEngine
pub struct AlignmentEngineHandle {
    engine: AlignmentEngine,
}

/// Create a new engine from a config and template, both as JSON.
///
/// # Safety
/// - `config_json` may be NULL to use the default configuration; otherwise it
///   must be a valid null-terminated C string.
/// - `template_json` must be a valid null-terminated C string.
/// - Returns a pointer to a newly allocated engine that must be freed with
///   `alignify_engine_free`.
/// - Returns NULL on error; call `alignify_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn alignify_engine_new(
    config_json: *const c_char,
    template_json: *const c_char,
) -> *mut AlignmentEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let config_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&config_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let template_str = match cstr_to_string(template_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid template string pointer");
            return ptr::null_mut();
        }
    };
    let template = match PoseTemplate::from_json(&template_str) {
        Ok(template) => template,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match AlignmentEngine::new(config, template) {
        Ok(engine) => Box::into_raw(Box::new(AlignmentEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `alignify_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn alignify_engine_free(engine: *mut AlignmentEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Process one landmark frame (JSON) and return the frame outcome as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `alignify_engine_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with
///   `alignify_free_string`.
/// - Returns NULL on error; call `alignify_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn alignify_engine_process_frame(
    engine: *mut AlignmentEngineHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *engine;

    let frame_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };
    let frame: LandmarkFrame = match serde_json::from_str(&frame_str) {
        Ok(frame) => frame,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let outcome = handle.engine.process_frame(&frame);
    match serde_json::to_string(&outcome) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Swap the active template (JSON). The stabilizer resets.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `alignify_engine_new`.
/// - `template_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `alignify_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn alignify_engine_set_template(
    engine: *mut AlignmentEngineHandle,
    template_json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let template_str = match cstr_to_string(template_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid template string pointer");
            return -1;
        }
    };
    let template = match PoseTemplate::from_json(&template_str) {
        Ok(template) => template,
        Err(e) => {
            set_last_error(&e.to_string());
            return -1;
        }
    };

    match handle.engine.set_template(template) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Seal the current session and return its metrics as JSON. The engine starts
/// a fresh session.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `alignify_engine_new`.
/// - Returns a newly allocated string that must be freed with
///   `alignify_free_string`.
/// - Returns NULL on error; call `alignify_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn alignify_engine_end_session(
    engine: *mut AlignmentEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *engine;

    let metrics = handle.engine.end_session();
    match serde_json::to_string(&metrics) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Alignify functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Alignify function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn alignify_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Alignify function call on
///   this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn alignify_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn alignify_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
