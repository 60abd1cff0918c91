use {
    byte_unit::{Byte, UnitType},
    chrono::{DateTime, Local, SubsecRound, Timelike},
    chunkcrypt_protocol::{ContainerInfo, DateTimeUtc},
    chunkcrypt_sdk::progress::percent,
    prettytable::{Table, format::FormatBuilder, row},
    std::fmt::Display,
};

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

#[must_use]
#[inline]
pub fn pretty_time(value: DateTimeUtc) -> impl Display {
    let mut local = DateTime::<Local>::from(value);
    if local.nanosecond() != 0 {
        local = local.trunc_subsecs(0) + chrono::Duration::seconds(1);
    }
    local.format(DATE_TIME_FORMAT)
}

#[must_use]
#[inline]
pub fn pretty_size(size: u64) -> impl Display {
    format!(
        "{:.2}",
        Byte::from_u64(size).get_appropriate_unit(UnitType::Binary)
    )
}

/// Status line text for a running transfer.
#[must_use]
#[inline]
pub fn transfer_status(action: &str, completed: u64, total: u64) -> String {
    format!(
        "{action}: {completed}/{total} chunks ({:.0}%)",
        percent(completed, total)
    )
}

/// Formats stored files as a table. The encrypted size includes per-chunk overhead.
#[must_use]
#[inline]
pub fn files_table(files: &[ContainerInfo]) -> Table {
    let mut table = Table::new();
    table.set_format(FormatBuilder::new().column_separator(' ').build());
    table.add_row(row!["Created", "Chunks", "Size", "Name"]);
    for file in files {
        table.add_row(row![
            pretty_time(file.created_at),
            file.object_count,
            pretty_size(file.total_size),
            file.name
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone, chunkcrypt_protocol::ContainerId};

    #[test]
    fn sizes() {
        assert_eq!(pretty_size(10 * 1024 * 1024).to_string(), "10.00 MiB");
        assert_eq!(pretty_size(1536).to_string(), "1.50 KiB");
    }

    #[test]
    fn status_text() {
        assert_eq!(
            transfer_status("Uploading", 3, 12),
            "Uploading: 3/12 chunks (25%)"
        );
        assert_eq!(
            transfer_status("Downloading", 0, 0),
            "Downloading: 0/0 chunks (100%)"
        );
    }

    #[test]
    fn table_lists_every_file() {
        let created_at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let files = vec![
            ContainerInfo {
                id: ContainerId("a".into()),
                name: "notes.txt".into(),
                created_at,
                object_count: 1,
                total_size: 1044,
            },
            ContainerInfo {
                id: ContainerId("b".into()),
                name: "video.mp4".into(),
                created_at,
                object_count: 3,
                total_size: 25 * 1024 * 1024 + 3 * 44,
            },
        ];
        let table = files_table(&files);
        assert_eq!(table.len(), 3);
        let text = table.to_string();
        assert!(text.contains("notes.txt"));
        assert!(text.contains("video.mp4"));
        assert!(text.contains("25.00 MiB"));
    }
}
