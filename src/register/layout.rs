// 📐 Register Layout - cursor blocks for the split register
//
// Eight physical columns. The lead block gains a notes row when the
// register runs in double-line mode.

use crate::table::{CellBlock, CellIo, CellName, CursorKind, TableLayout};

pub const NUM_COLS: usize = 8;

pub const COL_DATE: usize = 0;
pub const COL_NUM: usize = 1;
pub const COL_DESC: usize = 2;
pub const COL_XFER: usize = 3;
pub const COL_RECN: usize = 4;
pub const COL_DEBIT: usize = 5;
pub const COL_CREDIT: usize = 6;
pub const COL_BALANCE: usize = 7;

/// Shown in the transfer cell of a lead row whose transaction has more than two splits
pub const SPLIT_TRANS_STR: &str = "-- Split Transaction --";

pub fn create_layout(double_line: bool) -> TableLayout {
    let rows = if double_line { 2 } else { 1 };
    let mut layout = TableLayout::new();

    layout.add_block(
        CellBlock::new(CursorKind::Header, 1, NUM_COLS)
            .with_cell(0, COL_DATE, CellName::Date, CellIo::ReadOnly)
            .with_cell(0, COL_NUM, CellName::Num, CellIo::ReadOnly)
            .with_cell(0, COL_DESC, CellName::Description, CellIo::ReadOnly)
            .with_cell(0, COL_XFER, CellName::Transfer, CellIo::ReadOnly)
            .with_cell(0, COL_RECN, CellName::Reconcile, CellIo::ReadOnly)
            .with_cell(0, COL_DEBIT, CellName::Debit, CellIo::ReadOnly)
            .with_cell(0, COL_CREDIT, CellName::Credit, CellIo::ReadOnly)
            .with_cell(0, COL_BALANCE, CellName::Balance, CellIo::ReadOnly),
    );

    let mut lead = CellBlock::new(CursorKind::Lead, rows, NUM_COLS)
        .with_cell(0, COL_DATE, CellName::Date, CellIo::Input)
        .with_cell(0, COL_NUM, CellName::Num, CellIo::Input)
        .with_cell(0, COL_DESC, CellName::Description, CellIo::Input)
        .with_cell(0, COL_XFER, CellName::Transfer, CellIo::Input)
        .with_cell(0, COL_RECN, CellName::Reconcile, CellIo::ExactOnly)
        .with_cell(0, COL_DEBIT, CellName::Debit, CellIo::Input)
        .with_cell(0, COL_CREDIT, CellName::Credit, CellIo::Input)
        .with_cell(0, COL_BALANCE, CellName::Balance, CellIo::ReadOnly);

    // debit/credit here are transaction totals
    let mut expanded = CellBlock::new(CursorKind::ExpandedLead, rows, NUM_COLS)
        .with_cell(0, COL_DATE, CellName::Date, CellIo::Input)
        .with_cell(0, COL_NUM, CellName::Num, CellIo::Input)
        .with_cell(0, COL_DESC, CellName::Description, CellIo::Input)
        .with_cell(0, COL_DEBIT, CellName::Debit, CellIo::ReadOnly)
        .with_cell(0, COL_CREDIT, CellName::Credit, CellIo::ReadOnly)
        .with_cell(0, COL_BALANCE, CellName::Balance, CellIo::ReadOnly);

    if double_line {
        lead = lead.with_cell(1, COL_DESC, CellName::Notes, CellIo::Input);
        expanded = expanded.with_cell(1, COL_DESC, CellName::Notes, CellIo::Input);
    }

    layout.add_block(lead);
    layout.add_block(expanded);

    layout.add_block(
        CellBlock::new(CursorKind::Split, 1, NUM_COLS)
            .with_cell(0, COL_NUM, CellName::Action, CellIo::Input)
            .with_cell(0, COL_DESC, CellName::Memo, CellIo::Input)
            .with_cell(0, COL_XFER, CellName::Transfer, CellIo::Input)
            .with_cell(0, COL_RECN, CellName::Reconcile, CellIo::ExactOnly)
            .with_cell(0, COL_DEBIT, CellName::Debit, CellIo::Input)
            .with_cell(0, COL_CREDIT, CellName::Credit, CellIo::Input),
    );

    layout
}

/// Status-line text for a cell
pub fn help_text(name: CellName) -> &'static str {
    match name {
        CellName::Date => "Enter the transaction date",
        CellName::Num => "Enter the transaction number, such as the check number",
        CellName::Description => "Enter a description of the transaction",
        CellName::Transfer => "Enter the account to transfer from, or choose one from the list",
        CellName::Reconcile => "Enter the reconcile type",
        CellName::Debit => "Enter debit formula for real transaction",
        CellName::Credit => "Enter credit formula for real transaction",
        CellName::Balance => "Running balance of the account",
        CellName::Notes => "Enter notes for the transaction",
        CellName::Action => "Enter the type of transaction, or choose one from the list",
        CellName::Memo => "Enter a description of the split",
    }
}
