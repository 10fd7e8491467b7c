pub mod deadline;
pub mod io;
