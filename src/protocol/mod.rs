pub mod command;
pub mod field;
pub mod packet;
pub mod primitive;
pub mod response;
pub mod row;
pub mod transport;
pub mod value;

pub use field::{Field, FieldContext, SqlType};
pub use row::{BorrowedRow, DecodedRow, OwnedRow, RowView};
pub use transport::{PacketStream, Transport};
pub use value::Value;
