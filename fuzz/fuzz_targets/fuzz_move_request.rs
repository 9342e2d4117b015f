#![no_main]
use libfuzzer_sys::fuzz_target;
use nanofloat_core::MoveRequest;

fuzz_target!(|input: (&str, i64, i64)| {
    let (method, amount, current) = input;
    if let Ok(req) = MoveRequest::parse(method, amount) {
        match req.target_from(current) {
            Ok(target) => assert!(target >= 0 || req.method == nanofloat_core::MoveMethod::Relative),
            Err(e) => assert!(matches!(e, nanofloat_core::MotionError::InvalidTarget(_))),
        }
    }
});
