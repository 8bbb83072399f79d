pub mod datatype;
pub mod location;
pub mod page;
pub mod record;
