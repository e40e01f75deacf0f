use crate::constant::CommandByte;
use crate::protocol::primitive::*;

/// Write a command that carries no arguments (COM_PING, COM_QUIT, COM_RESET_CONNECTION, ..)
pub fn write_simple_command(out: &mut Vec<u8>, command: CommandByte) {
    write_int_1(out, command as u8);
}

/// Write COM_INIT_DB command
pub fn write_init_db(out: &mut Vec<u8>, database: &str) {
    write_int_1(out, CommandByte::InitDb as u8);
    out.extend_from_slice(database.as_bytes());
}
