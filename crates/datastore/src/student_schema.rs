//! The schema the roster tools share.
//!
//! - `student_ids` gives each classroom-system student a surrogate `student_id` (see [crate::assign_surrogate_ids]).
//! - `transparent_classroom_student_data` holds one snapshot of a student's profile per pull.
use crate::errors::*;
use crate::{SchemaDescriptor, SchemaDescriptorBuilder};

pub const STUDENT_IDS: &str = "student_ids";
pub const CLASSROOM_STUDENT_DATA: &str = "transparent_classroom_student_data";

pub fn student_data_schema() -> Result<SchemaDescriptor> {
    let mut builder = SchemaDescriptorBuilder::new();

    builder.add_table(STUDENT_IDS.into(), |tb| {
        tb.add_key_column("tc_school_id".into())?;
        tb.add_key_column("tc_student_id".into())?;
        tb.add_value_column("student_id".into())?;
        Ok(())
    })?;

    builder.add_table(CLASSROOM_STUDENT_DATA.into(), |tb| {
        for k in ["tc_school_id", "tc_student_id", "pull_datetime"] {
            tb.add_key_column(k.into())?;
        }
        for v in [
            "student_first_name",
            "student_last_name",
            "student_birth_date",
            "student_gender",
            "student_ethnicity_list",
            "student_dominant_language",
        ] {
            tb.add_value_column(v.into())?;
        }
        Ok(())
    })?;

    builder.build()
}
