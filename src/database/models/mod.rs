pub mod attendance;
pub mod session;

pub use attendance::{AttendanceAttempt, ClientInfoRecord};
pub use session::{SessionDetails, SessionRow};
