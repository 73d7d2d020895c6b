//! Worksheet cell addressing
//!
//! Rows are keyed by the calendar day, columns by the member's roster
//! position and the metric being recorded. With the default layout the
//! first member's volume for day 1 lands in `B3`, the second member's in
//! `F3`, and new-user counts sit one column to the right of each volume.

use crate::command::Metric;
use crate::config::LayoutSection;
use chrono::{Datelike, FixedOffset, Local, Utc};
use std::fmt;

/// 1-based spreadsheet coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// A1 notation, e.g. `B5`
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Last column a sheet can address (`ZZZ`)
pub const MAX_SHEET_COLUMNS: u32 = 18_278;

/// Row cap of a Google spreadsheet (10 million cells in a single column)
pub const MAX_SHEET_ROWS: u32 = 10_000_000;

pub const MAX_DAY_OF_MONTH: u32 = 31;

/// Column number to letters (1 = A, 26 = Z, 27 = AA). Column 0 has no letters.
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Range string for a single cell on a named worksheet: `'vol_t7'!B5`
pub fn a1_range(worksheet: &str, cell: &CellAddress) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cell.to_a1())
}

/// Maps (member, metric, day) to a cell
#[derive(Debug, Clone)]
pub struct SheetLayout {
    day_row_offset: u32,
    first_member_column: u32,
    member_column_stride: u32,
    volume_column_offset: u32,
    new_users_column_offset: u32,
    utc_offset: Option<FixedOffset>,
}

impl SheetLayout {
    pub fn from_config(layout: &LayoutSection) -> Self {
        Self {
            day_row_offset: layout.day_row_offset,
            first_member_column: layout.first_member_column,
            member_column_stride: layout.member_column_stride,
            volume_column_offset: layout.volume_column_offset,
            new_users_column_offset: layout.new_users_column_offset,
            utc_offset: layout
                .utc_offset_minutes
                .and_then(|minutes| FixedOffset::east_opt(minutes * 60)),
        }
    }

    fn metric_offset(&self, metric: Metric) -> u32 {
        match metric {
            Metric::Volume => self.volume_column_offset,
            Metric::NewUsers => self.new_users_column_offset,
        }
    }

    /// Target cell for a member's figure on the given day of month
    pub fn cell_for(&self, member_index: u32, metric: Metric, day_of_month: u32) -> CellAddress {
        // saturates instead of wrapping; validated layouts never get near u32::MAX
        CellAddress {
            row: day_of_month.saturating_add(self.day_row_offset),
            column: self
                .first_member_column
                .saturating_add(member_index.saturating_mul(self.member_column_stride))
                .saturating_add(self.metric_offset(metric)),
        }
    }

    /// Today's day of month in the configured time zone
    pub fn today(&self) -> u32 {
        match self.utc_offset {
            Some(offset) => Utc::now().with_timezone(&offset).day(),
            None => Local::now().day(),
        }
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::from_config(&LayoutSection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(2), "B");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(53), "BA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(column_letters(0), "");
    }

    #[test]
    fn test_default_layout_positions() {
        let layout = SheetLayout::default();

        // first member, day 1
        assert_eq!(layout.cell_for(0, Metric::Volume, 1), CellAddress::new(3, 2));
        assert_eq!(layout.cell_for(0, Metric::Volume, 1).to_a1(), "B3");

        // third member, day 15: column 2 + 2 * 4 = 10 (J)
        assert_eq!(layout.cell_for(2, Metric::Volume, 15).to_a1(), "J17");
        assert_eq!(layout.cell_for(2, Metric::NewUsers, 15).to_a1(), "K17");

        // day 31 is the last row in use
        assert_eq!(layout.cell_for(4, Metric::Volume, 31).to_a1(), "R33");
    }

    #[test]
    fn test_custom_layout() {
        let layout = SheetLayout::from_config(&LayoutSection {
            day_row_offset: 5,
            first_member_column: 3,
            member_column_stride: 6,
            volume_column_offset: 1,
            new_users_column_offset: 3,
            utc_offset_minutes: Some(420),
        });

        assert_eq!(layout.cell_for(1, Metric::Volume, 2), CellAddress::new(7, 10));
        assert_eq!(layout.cell_for(1, Metric::NewUsers, 2), CellAddress::new(7, 12));
    }

    #[test]
    fn test_oversized_layout_does_not_overflow() {
        let layout = SheetLayout::from_config(&LayoutSection {
            day_row_offset: u32::MAX - 5,
            member_column_stride: u32::MAX / 2,
            ..LayoutSection::default()
        });

        let cell = layout.cell_for(3, Metric::NewUsers, 31);
        assert_eq!(cell.row, u32::MAX);
        assert_eq!(cell.column, u32::MAX);
    }

    #[test]
    fn test_a1_range_quotes_worksheet() {
        let cell = CellAddress::new(5, 2);
        assert_eq!(a1_range("vol_t7", &cell), "'vol_t7'!B5");
        assert_eq!(a1_range("Tom's sheet", &cell), "'Tom''s sheet'!B5");
    }

    #[test]
    fn test_today_is_a_day_of_month() {
        let day = SheetLayout::default().today();
        assert!((1..=31).contains(&day));

        let shifted = SheetLayout::from_config(&LayoutSection {
            utc_offset_minutes: Some(-600),
            ..LayoutSection::default()
        });
        assert!((1..=31).contains(&shifted.today()));
    }

    proptest! {
        #[test]
        fn column_letters_are_uppercase_ascii(column in 1u32..100_000) {
            let letters = column_letters(column);
            prop_assert!(!letters.is_empty());
            prop_assert!(letters.chars().all(|c| c.is_ascii_uppercase()));
        }

        #[test]
        fn members_never_share_a_column(
            a in 0u32..50,
            b in 0u32..50,
            day in 1u32..=31,
        ) {
            prop_assume!(a != b);
            let layout = SheetLayout::default();
            for metric_a in [Metric::Volume, Metric::NewUsers] {
                for metric_b in [Metric::Volume, Metric::NewUsers] {
                    prop_assert_ne!(
                        layout.cell_for(a, metric_a, day),
                        layout.cell_for(b, metric_b, day)
                    );
                }
            }
        }

        #[test]
        fn row_tracks_day(day in 1u32..=31, member in 0u32..20) {
            let layout = SheetLayout::default();
            prop_assert_eq!(layout.cell_for(member, Metric::Volume, day).row, day + 2);
        }
    }
}
