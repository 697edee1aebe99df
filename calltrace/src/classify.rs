//! Maps a raw record header to the event kind the dispatcher switches on.

use calltrace_common::{EventKind, CALL_TRACE_CLASS_ID};

use crate::TraceRecord;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Classification {
    /// The record belongs to some other provider sharing the transport.
    Foreign,
    /// The record is ours and carries a recognized kind.
    Known(EventKind),
    /// The record is ours but its type code is not in the enumeration.
    Unknown(u8),
}

pub fn classify(record: &TraceRecord<'_>) -> Classification {
    if record.class_id != CALL_TRACE_CLASS_ID {
        return Classification::Foreign;
    }
    match EventKind::from_wire(record.kind) {
        Some(kind) => Classification::Known(kind),
        None => Classification::Unknown(record.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltrace_common::ClassId;

    fn record(class_id: ClassId, kind: u8) -> TraceRecord<'static> {
        TraceRecord {
            class_id,
            kind,
            process_id: 1,
            thread_id: 1,
            timestamp: 0,
            payload: &[],
        }
    }

    #[test]
    fn should_classify_recognized_kinds() {
        let record = record(CALL_TRACE_CLASS_ID, EventKind::EnterFunction.wire_code());

        assert_eq!(
            classify(&record),
            Classification::Known(EventKind::EnterFunction)
        );
    }

    #[test]
    fn should_flag_foreign_classes_before_looking_at_the_kind() {
        let mut bytes = CALL_TRACE_CLASS_ID.0;
        bytes[7] ^= 0x01;
        let record = record(ClassId(bytes), EventKind::EnterFunction.wire_code());

        assert_eq!(classify(&record), Classification::Foreign);
    }

    #[test]
    fn should_flag_unknown_type_codes() {
        let record = record(CALL_TRACE_CLASS_ID, 200);

        assert_eq!(classify(&record), Classification::Unknown(200));
    }
}
