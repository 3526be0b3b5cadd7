pub mod attendance_record;
pub mod qr_code;
pub mod session;
pub mod student;
pub mod teacher;

pub use attendance_record::Entity as AttendanceRecord;
pub use qr_code::Entity as QrCode;
pub use session::Entity as Session;
pub use student::Entity as Student;
pub use teacher::Entity as Teacher;
