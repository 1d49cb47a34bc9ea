pub mod attendance_service;

pub use attendance_service::{
    resolve_claim, status, AttendanceError, AttendanceResponse, AttendanceService, MalformedRequest,
};
