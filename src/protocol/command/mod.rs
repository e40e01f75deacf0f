pub mod local_infile;
pub mod prepared;
pub mod query;
pub mod utility;
