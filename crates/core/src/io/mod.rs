//! I/O operations for reading and writing volumes and study tables

mod table;
mod tiff_volume;

pub use table::{StudyRecord, read_study_table, read_study_table_from_reader};
pub use tiff_volume::{
    load_volume, load_volumes, read_volume, read_volume_from_buffer, write_volume,
    write_volume_to_buffer,
};
