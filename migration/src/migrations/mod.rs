pub mod m202608240001_create_teachers;
pub mod m202608240002_create_students;
pub mod m202608240003_create_sessions;
pub mod m202608240004_create_qr_codes;
pub mod m202608240005_create_attendance_records;
