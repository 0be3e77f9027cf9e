// 🧮 Virtual Table - grid of cursor blocks over a changing list of rows
//
// Each virtual cell binds a cursor block (a fixed-size group of physical
// cells) to an entity handle. Exactly one virtual cell holds the current
// cursor; its cell values live here until the register saves them.

use std::collections::{BTreeMap, HashMap};

use crate::entities::SplitId;
use crate::ports::{PresentationEvent, PresentationListener};

// ============================================================================
// LOCATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VirtualCellLocation {
    pub row: i32,
    pub col: i32,
}

impl VirtualCellLocation {
    pub fn new(row: i32, col: i32) -> Self {
        VirtualCellLocation { row, col }
    }
}

/// A virtual cell plus the physical offset inside its cursor block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VirtualLocation {
    pub vcell: VirtualCellLocation,
    pub phys_row_offset: i32,
    pub phys_col_offset: i32,
}

impl VirtualLocation {
    pub fn new(row: i32, col: i32, phys_row_offset: i32, phys_col_offset: i32) -> Self {
        VirtualLocation {
            vcell: VirtualCellLocation::new(row, col),
            phys_row_offset,
            phys_col_offset,
        }
    }

    /// Points at nothing; moving the cursor here clears it
    pub fn invalid() -> Self {
        VirtualLocation::new(-1, -1, -1, -1)
    }

    pub fn at_row(row: i32) -> Self {
        VirtualLocation::new(row, 0, 0, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalDir {
    /// Explicit destination (mouse click, programmatic jump)
    Pointer,
    Left,
    Right,
    Up,
    Down,
}

// ============================================================================
// CURSOR BLOCKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    Header,
    /// Collapsed transaction row of an account register
    Lead,
    /// Transaction row whose splits are shown beneath it
    ExpandedLead,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorClass {
    None,
    Trans,
    Split,
}

impl CursorKind {
    pub fn class(&self) -> CursorClass {
        match self {
            CursorKind::Header => CursorClass::None,
            CursorKind::Lead | CursorKind::ExpandedLead => CursorClass::Trans,
            CursorKind::Split => CursorClass::Split,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellName {
    Date,
    Num,
    Description,
    Transfer,
    Reconcile,
    Debit,
    Credit,
    Balance,
    Notes,
    Action,
    Memo,
}

impl CellName {
    pub fn label(&self) -> &'static str {
        match self {
            CellName::Date => "Date",
            CellName::Num => "Num",
            CellName::Description => "Description",
            CellName::Transfer => "Transfer",
            CellName::Reconcile => "R",
            CellName::Debit => "Debit",
            CellName::Credit => "Credit",
            CellName::Balance => "Balance",
            CellName::Notes => "Notes",
            CellName::Action => "Action",
            CellName::Memo => "Memo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellIo {
    /// Shown, never a tab stop
    ReadOnly,
    Input,
    /// Only reachable by naming it explicitly (pointer), skipped when tabbing
    ExactOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCell {
    pub name: CellName,
    pub io: CellIo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellBlock {
    pub kind: CursorKind,
    pub rows: usize,
    pub cols: usize,
    cells: Vec<Option<BlockCell>>,
}

impl CellBlock {
    pub fn new(kind: CursorKind, rows: usize, cols: usize) -> Self {
        CellBlock {
            kind,
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    pub fn with_cell(mut self, row: usize, col: usize, name: CellName, io: CellIo) -> Self {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = Some(BlockCell { name, io });
        }
        self
    }

    pub fn cell(&self, row: i32, col: i32) -> Option<&BlockCell> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return None;
        }
        self.cells[row as usize * self.cols + col as usize].as_ref()
    }

    /// Physical offset of a named cell
    pub fn locate(&self, name: CellName) -> Option<(i32, i32)> {
        let index = self.cells.iter().position(|c| c.map(|c| c.name) == Some(name))?;
        Some(((index / self.cols) as i32, (index % self.cols) as i32))
    }

    pub fn cell_names(&self) -> impl Iterator<Item = CellName> + '_ {
        self.cells.iter().flatten().map(|c| c.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableLayout {
    blocks: HashMap<CursorKind, CellBlock>,
}

impl TableLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block: CellBlock) {
        self.blocks.insert(block.kind, block);
    }

    pub fn block(&self, kind: CursorKind) -> Option<&CellBlock> {
        self.blocks.get(&kind)
    }
}

// ============================================================================
// VIRTUAL CELLS + CURSOR VALUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualCell {
    pub cursor: CursorKind,
    /// None marks a transaction's blank split row
    pub split: Option<SplitId>,
    pub visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CellValue {
    text: String,
    changed: bool,
}

/// Edited values of a cursor, kept across a reload
#[derive(Debug, Clone, PartialEq)]
pub struct CursorBuffer {
    kind: CursorKind,
    cells: Vec<(CellName, String)>,
}

// ============================================================================
// TABLE
// ============================================================================

pub struct Table {
    layout: TableLayout,
    vcells: Vec<Vec<Option<VirtualCell>>>,
    num_virt_rows: usize,
    num_virt_cols: usize,
    current_cursor: Option<CursorKind>,
    current_cursor_loc: VirtualLocation,
    values: BTreeMap<CellName, CellValue>,
    /// First row dated after today, if any
    pub dividing_row: Option<i32>,
    listeners: Vec<PresentationListener>,
}

impl Table {
    pub fn new(layout: TableLayout) -> Self {
        Table {
            layout,
            vcells: Vec::new(),
            num_virt_rows: 0,
            num_virt_cols: 0,
            current_cursor: None,
            current_cursor_loc: VirtualLocation::invalid(),
            values: BTreeMap::new(),
            dividing_row: None,
            listeners: Vec::new(),
        }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: TableLayout) {
        self.layout = layout;
    }

    pub fn add_listener(&mut self, listener: PresentationListener) {
        self.listeners.push(listener);
    }

    pub(crate) fn notify(&mut self, event: PresentationEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn num_virt_rows(&self) -> usize {
        self.num_virt_rows
    }

    pub fn num_virt_cols(&self) -> usize {
        self.num_virt_cols
    }

    // ========================================================================
    // GRID
    // ========================================================================

    /// Cells outside the new bounds are dropped
    pub fn set_size(&mut self, rows: usize, cols: usize) {
        self.resize(rows, cols);
        self.notify(PresentationEvent::TableResized { rows, cols });
    }

    fn resize(&mut self, rows: usize, cols: usize) {
        self.vcells.resize_with(rows, Vec::new);
        for row in self.vcells.iter_mut() {
            row.resize(cols, None);
        }
        self.num_virt_rows = rows;
        self.num_virt_cols = cols;
    }

    /// Bind a cursor block and entity to a location, growing the grid if needed
    pub fn set_vcell(&mut self, loc: VirtualCellLocation, cursor: CursorKind, split: Option<SplitId>, visible: bool) {
        if loc.row < 0 || loc.col < 0 {
            return;
        }
        let rows = self.num_virt_rows.max(loc.row as usize + 1);
        let cols = self.num_virt_cols.max(loc.col as usize + 1);
        if rows != self.num_virt_rows || cols != self.num_virt_cols {
            self.resize(rows, cols);
        }
        self.vcells[loc.row as usize][loc.col as usize] = Some(VirtualCell { cursor, split, visible });
    }

    pub fn vcell(&self, loc: VirtualCellLocation) -> Option<&VirtualCell> {
        if self.out_of_bounds(loc) {
            return None;
        }
        self.vcells[loc.row as usize][loc.col as usize].as_ref()
    }

    fn vcell_mut(&mut self, loc: VirtualCellLocation) -> Option<&mut VirtualCell> {
        if self.out_of_bounds(loc) {
            return None;
        }
        self.vcells[loc.row as usize][loc.col as usize].as_mut()
    }

    pub fn set_vcell_visible(&mut self, loc: VirtualCellLocation, visible: bool) {
        if let Some(vcell) = self.vcell_mut(loc) {
            vcell.visible = visible;
        }
    }

    pub fn set_vcell_cursor(&mut self, loc: VirtualCellLocation, cursor: CursorKind) {
        if let Some(vcell) = self.vcell_mut(loc) {
            vcell.cursor = cursor;
        }
        if loc == self.current_cursor_loc.vcell {
            self.current_cursor = Some(cursor);
        }
    }

    pub fn set_vcell_split(&mut self, loc: VirtualCellLocation, split: Option<SplitId>) {
        if let Some(vcell) = self.vcell_mut(loc) {
            vcell.split = split;
        }
    }

    #[inline]
    pub fn out_of_bounds(&self, loc: VirtualCellLocation) -> bool {
        loc.row < 0
            || loc.col < 0
            || loc.row as usize >= self.num_virt_rows
            || loc.col as usize >= self.num_virt_cols
    }

    pub fn block_at(&self, loc: VirtualCellLocation) -> Option<&CellBlock> {
        self.layout.block(self.vcell(loc)?.cursor)
    }

    pub fn cell_at(&self, loc: VirtualLocation) -> Option<&BlockCell> {
        self.block_at(loc.vcell)?.cell(loc.phys_row_offset, loc.phys_col_offset)
    }

    /// A legal place for the cursor. `exact` also admits pointer-only cells.
    pub fn virtual_loc_valid(&self, loc: VirtualLocation, exact: bool) -> bool {
        let Some(vcell) = self.vcell(loc.vcell) else {
            return false;
        };
        if !vcell.visible {
            return false;
        }
        match self.cell_at(loc).map(|c| c.io) {
            Some(CellIo::Input) => true,
            Some(CellIo::ExactOnly) => exact,
            _ => false,
        }
    }

    /// Every visible (virtual row, physical row) pair, top to bottom
    pub fn visible_rows(&self) -> Vec<(VirtualCellLocation, usize)> {
        let mut out = Vec::new();
        for row in 0..self.num_virt_rows {
            let loc = VirtualCellLocation::new(row as i32, 0);
            match (self.vcell(loc), self.block_at(loc)) {
                (Some(vcell), Some(block)) if vcell.visible => {
                    out.extend((0..block.rows).map(|p| (loc, p)));
                }
                _ => {}
            }
        }
        out
    }

    // ========================================================================
    // CURRENT CURSOR
    // ========================================================================

    pub fn current_location(&self) -> VirtualLocation {
        self.current_cursor_loc
    }

    pub fn current_cursor(&self) -> Option<CursorKind> {
        self.current_cursor
    }

    /// Reposition the cursor without telling the display
    pub fn move_cursor(&mut self, loc: VirtualLocation) {
        self.values.clear();
        match self.vcell(loc.vcell) {
            Some(vcell) => {
                self.current_cursor = Some(vcell.cursor);
                self.current_cursor_loc = loc;
            }
            None => {
                self.current_cursor = None;
                self.current_cursor_loc = VirtualLocation::invalid();
            }
        }
    }

    /// Reposition the cursor and tell the display
    pub fn move_cursor_gui(&mut self, loc: VirtualLocation) {
        self.move_cursor(loc);
        let current = self.current_cursor_loc;
        self.notify(PresentationEvent::CursorMoved(current));
    }

    /// Move within the current cursor block (no save, no reload)
    pub(crate) fn set_current_offset(&mut self, loc: VirtualLocation) {
        if loc.vcell == self.current_cursor_loc.vcell {
            self.current_cursor_loc = loc;
        }
    }

    pub fn current_cell_name(&self) -> Option<CellName> {
        self.cell_at(self.current_cursor_loc).map(|c| c.name)
    }

    /// Location of a named cell inside the current cursor
    pub fn current_cell_location(&self, name: CellName) -> Option<VirtualLocation> {
        let block = self.block_at(self.current_cursor_loc.vcell)?;
        let (row, col) = block.locate(name)?;
        Some(VirtualLocation {
            vcell: self.current_cursor_loc.vcell,
            phys_row_offset: row,
            phys_col_offset: col,
        })
    }

    pub fn cell_value(&self, name: CellName) -> &str {
        self.values.get(&name).map(|v| v.text.as_str()).unwrap_or("")
    }

    /// User edit: marks the cell changed when the text differs
    pub fn set_cell_value(&mut self, name: CellName, text: &str) {
        let value = self.values.entry(name).or_default();
        if value.text != text {
            value.text = text.to_string();
            value.changed = true;
        }
    }

    /// Fill from the model: never marks the cell changed
    pub fn load_cell_value(&mut self, name: CellName, text: String) {
        self.values.insert(name, CellValue { text, changed: false });
    }

    pub fn mark_cell_changed(&mut self, name: CellName) {
        self.values.entry(name).or_default().changed = true;
    }

    pub fn cell_changed(&self, name: CellName) -> bool {
        self.values.get(&name).map(|v| v.changed).unwrap_or(false)
    }

    /// Names of the cells edited in the current cursor
    pub fn changed_cells(&self) -> Vec<CellName> {
        self.values.iter().filter(|(_, v)| v.changed).map(|(name, _)| *name).collect()
    }

    pub fn current_cursor_changed(&self) -> bool {
        self.values.values().any(|v| v.changed)
    }

    pub fn clear_current_cursor_changes(&mut self) {
        for value in self.values.values_mut() {
            value.changed = false;
        }
    }

    pub fn save_current_cursor(&self) -> Option<CursorBuffer> {
        let kind = self.current_cursor?;
        let cells: Vec<(CellName, String)> = self
            .values
            .iter()
            .filter(|(_, v)| v.changed)
            .map(|(name, v)| (*name, v.text.clone()))
            .collect();

        if cells.is_empty() {
            return None;
        }
        Some(CursorBuffer { kind, cells })
    }

    /// Re-apply saved edits when the cursor landed on the same kind of block
    pub fn restore_current_cursor(&mut self, buffer: &CursorBuffer) {
        if self.current_cursor != Some(buffer.kind) {
            return;
        }
        for (name, text) in &buffer.cells {
            self.set_cell_value(*name, text);
            self.mark_cell_changed(*name);
        }
    }

    // ========================================================================
    // MOVEMENT
    // ========================================================================

    fn next_visible_row(&self, row: i32, delta: i32) -> Option<i32> {
        let mut r = row + delta;
        while r >= 0 && (r as usize) < self.num_virt_rows {
            if self.vcell(VirtualCellLocation::new(r, 0)).map(|v| v.visible).unwrap_or(false) {
                return Some(r);
            }
            r += delta;
        }
        None
    }

    /// Next physical cell in reading order, crossing visible rows
    fn step(&self, loc: VirtualLocation, forward: bool) -> Option<VirtualLocation> {
        let block = self.block_at(loc.vcell)?;
        let (rows, cols) = (block.rows as i32, block.cols as i32);
        let mut next = loc;

        if forward {
            next.phys_col_offset += 1;
            if next.phys_col_offset >= cols {
                next.phys_col_offset = 0;
                next.phys_row_offset += 1;
            }
            if next.phys_row_offset >= rows {
                next.vcell.row = self.next_visible_row(loc.vcell.row, 1)?;
                next.phys_row_offset = 0;
                next.phys_col_offset = 0;
            }
        } else {
            next.phys_col_offset -= 1;
            if next.phys_col_offset < 0 {
                next.phys_col_offset = cols - 1;
                next.phys_row_offset -= 1;
            }
            if next.phys_row_offset < 0 {
                let row = self.next_visible_row(loc.vcell.row, -1)?;
                let prev = self.block_at(VirtualCellLocation::new(row, loc.vcell.col))?;
                next.vcell.row = row;
                next.phys_row_offset = prev.rows as i32 - 1;
                next.phys_col_offset = prev.cols as i32 - 1;
            }
        }

        Some(next)
    }

    /// Next tab stop; None when there is nowhere left to go
    pub fn move_tab(&self, loc: VirtualLocation, forward: bool) -> Option<VirtualLocation> {
        let mut at = loc;
        loop {
            at = self.step(at, forward)?;
            if self.virtual_loc_valid(at, false) {
                return Some(at);
            }
        }
    }

    /// Move by physical rows over visible virtual cells, keeping the column
    pub fn move_vertical_position(&self, loc: VirtualLocation, phys_row_delta: i32) -> Option<VirtualLocation> {
        let dir = phys_row_delta.signum();
        let mut loc = loc;

        for _ in 0..phys_row_delta.abs() {
            let block = self.block_at(loc.vcell)?;
            let offset = loc.phys_row_offset + dir;

            if offset >= 0 && offset < block.rows as i32 {
                loc.phys_row_offset = offset;
            } else {
                let row = self.next_visible_row(loc.vcell.row, dir)?;
                let next = self.block_at(VirtualCellLocation::new(row, loc.vcell.col))?;
                loc.vcell.row = row;
                loc.phys_row_offset = if dir > 0 { 0 } else { next.rows as i32 - 1 };
                loc.phys_col_offset = loc.phys_col_offset.min(next.cols as i32 - 1);
            }
        }

        Some(loc)
    }

    /// Nearest valid cell within the same virtual cell
    pub fn find_valid_cell_horiz(&self, loc: VirtualLocation, exact: bool) -> Option<VirtualLocation> {
        if self.virtual_loc_valid(loc, exact) {
            return Some(loc);
        }
        if !self.vcell(loc.vcell)?.visible {
            return None;
        }

        let block = self.block_at(loc.vcell)?;
        let (rows, cols) = (block.rows as i32, block.cols as i32);
        let start_row = loc.phys_row_offset.clamp(0, rows - 1);
        let start_col = loc.phys_col_offset.clamp(0, cols - 1);
        let row_order = std::iter::once(start_row).chain((0..rows).filter(|r| *r != start_row));

        for phys_row in row_order {
            let (mut left, mut right) = (start_col, start_col);
            while left >= 0 || right < cols {
                for phys_col in [right, left] {
                    let at = VirtualLocation {
                        vcell: loc.vcell,
                        phys_row_offset: phys_row,
                        phys_col_offset: phys_col,
                    };
                    if self.virtual_loc_valid(at, exact) {
                        return Some(at);
                    }
                }
                left -= 1;
                right += 1;
            }
        }

        None
    }

    /// Snap a possibly invalid location to the closest legal tab stop:
    /// the same row first, then rows below, then rows above.
    pub fn find_close_valid_cell(&self, loc: VirtualLocation, exact: bool) -> Option<VirtualLocation> {
        let first = self.first_body_row();
        if first >= self.num_virt_rows as i32 || self.num_virt_cols == 0 {
            return None;
        }

        let mut loc = loc;
        loc.vcell.row = loc.vcell.row.clamp(first, self.num_virt_rows as i32 - 1);
        loc.vcell.col = loc.vcell.col.clamp(0, self.num_virt_cols as i32 - 1);
        let start = loc.vcell.row;

        let below = start..self.num_virt_rows as i32;
        let above = (first..start).rev();

        for row in below.chain(above) {
            let at = VirtualLocation {
                vcell: VirtualCellLocation::new(row, loc.vcell.col),
                ..loc
            };
            if let Some(found) = self.find_valid_cell_horiz(at, exact) {
                return Some(found);
            }
        }

        None
    }

    /// First row below the header rows at the top of the table
    fn first_body_row(&self) -> i32 {
        (0..self.num_virt_rows as i32)
            .find(|&row| {
                self.vcell(VirtualCellLocation::new(row, 0))
                    .map_or(true, |v| v.cursor != CursorKind::Header)
            })
            .unwrap_or(self.num_virt_rows as i32)
    }

    /// Where a keyboard traversal would go before the register weighs in
    pub fn candidate_destination(&self, dir: TraversalDir) -> VirtualLocation {
        let current = self.current_cursor_loc;

        match dir {
            TraversalDir::Pointer => current,
            TraversalDir::Right => self.move_tab(current, true).unwrap_or(current),
            TraversalDir::Left => self.move_tab(current, false).unwrap_or(current),
            TraversalDir::Up | TraversalDir::Down => {
                let delta = if dir == TraversalDir::Down { 1 } else { -1 };
                let mut at = current;
                loop {
                    match self.move_vertical_position(at, delta) {
                        Some(next) => at = next,
                        None => return current,
                    }
                    if let Some(found) = self.find_valid_cell_horiz(at, false) {
                        return found;
                    }
                }
            }
        }
    }
}
