//! Dependency tracking for formula calculation

use ahash::{AHashMap, AHashSet};
use gridcalc_core::CellRange;

use crate::ast::AstNode;
use crate::engine::FormulaEngine;
use crate::source::{CellKey, SheetDataSource, SheetId};

/// Something a formula reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precedent {
    Cell(CellKey),
    /// A block of cells; whole rows and columns use the full sheet extent
    Area { sheet: SheetId, range: CellRange },
}

impl Precedent {
    pub fn contains(&self, key: CellKey) -> bool {
        match self {
            Precedent::Cell(cell) => *cell == key,
            Precedent::Area { sheet, range } => {
                *sheet == key.sheet && range.contains(key.row, key.col)
            }
        }
    }
}

/// Static references of one formula
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    pub precedents: Vec<Precedent>,
    /// The formula builds references at run time (`:` between computed
    /// operands), so its precedents are not fully known
    pub dynamic: bool,
}

/// Extract the references a formula on `sheet` reads
///
/// Defined names are expanded through their expressions. References to
/// unknown sheets or tables are dropped, since they evaluate to `#REF!`
/// without reading anything.
pub fn collect_references(
    ast: &AstNode,
    sheet: SheetId,
    data: &dyn SheetDataSource,
    engine: &FormulaEngine,
) -> References {
    let mut out = References::default();
    let mut seen_names = Vec::new();
    collect_into(ast, sheet, data, engine, &mut seen_names, &mut out);
    out
}

fn collect_into(
    ast: &AstNode,
    sheet: SheetId,
    data: &dyn SheetDataSource,
    engine: &FormulaEngine,
    seen_names: &mut Vec<String>,
    out: &mut References,
) {
    match ast {
        AstNode::Reference(r) => {
            if let Ok((target_sheet, range)) = r.area_from(data, sheet) {
                let (start, end) = (range.start, range.end);
                out.precedents.push(if range.is_single_cell() {
                    Precedent::Cell(CellKey::new(target_sheet, start.row, start.col))
                } else {
                    // `$` markers do not change what is read
                    Precedent::Area {
                        sheet: target_sheet,
                        range: CellRange::from_indices(start.row, start.col, end.row, end.col),
                    }
                });
            }
        }
        AstNode::Name(name) => {
            if seen_names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return;
            }
            seen_names.push(name.clone());
            if let Some(expression) = data.defined_name(name, sheet) {
                match engine.parse(expression) {
                    Ok(named) => collect_into(&named, sheet, data, engine, seen_names, out),
                    Err(e) => tracing::debug!(
                        name = name.as_str(),
                        error = %e,
                        "skipping unparsable name"
                    ),
                }
            } else if let Some(table) = data.table(name) {
                out.precedents.push(Precedent::Area {
                    sheet: table.sheet(),
                    range: table.data_range(),
                });
            }
        }
        AstNode::Range { .. } => {
            out.dynamic = true;
            for child in ast.children() {
                collect_into(child, sheet, data, engine, seen_names, out);
            }
        }
        _ => {
            for child in ast.children() {
                collect_into(child, sheet, data, engine, seen_names, out);
            }
        }
    }
}

/// Formula cells in an order where every cell comes after its precedents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcOrder {
    pub order: Vec<CellKey>,
    /// Cells that sit on a reference cycle
    pub circular: AHashSet<CellKey>,
}

/// Dependency graph for formula cells
///
/// Single-cell precedents are indexed directly; area precedents are kept per
/// formula and scanned, since one area can cover millions of cells.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Formula cell → what it reads
    precedents: AHashMap<CellKey, Vec<Precedent>>,
    /// Cell → formula cells reading it through a single-cell reference
    dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Formula cells reading at least one area
    area_readers: AHashSet<CellKey>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the precedents of a formula cell
    pub fn set_precedents(&mut self, cell: CellKey, precedents: Vec<Precedent>) {
        self.remove(cell);
        for precedent in &precedents {
            match precedent {
                Precedent::Cell(key) => {
                    self.dependents.entry(*key).or_default().insert(cell);
                }
                Precedent::Area { .. } => {
                    self.area_readers.insert(cell);
                }
            }
        }
        self.precedents.insert(cell, precedents);
    }

    /// Forget a formula cell; cells that read it keep their edges
    pub fn remove(&mut self, cell: CellKey) {
        if let Some(old) = self.precedents.remove(&cell) {
            for precedent in old {
                if let Precedent::Cell(key) = precedent {
                    if let Some(set) = self.dependents.get_mut(&key) {
                        set.remove(&cell);
                        if set.is_empty() {
                            self.dependents.remove(&key);
                        }
                    }
                }
            }
        }
        self.area_readers.remove(&cell);
    }

    pub fn contains(&self, cell: CellKey) -> bool {
        self.precedents.contains_key(&cell)
    }

    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    pub fn clear(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
        self.area_readers.clear();
    }

    pub fn precedents_of(&self, cell: CellKey) -> &[Precedent] {
        self.precedents.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Formula cells that read `cell` directly or through an area
    pub fn dependents_of(&self, cell: CellKey) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .collect();
        for reader in &self.area_readers {
            let reads = self
                .precedents_of(*reader)
                .iter()
                .any(|p| matches!(p, Precedent::Area { .. }) && p.contains(cell));
            if reads && !out.contains(reader) {
                out.push(*reader);
            }
        }
        out.sort_unstable();
        out
    }

    /// Every formula cell whose value can change when `changed` change
    pub fn transitive_dependents(
        &self,
        changed: impl IntoIterator<Item = CellKey>,
    ) -> AHashSet<CellKey> {
        let mut out = AHashSet::new();
        let mut pending: Vec<CellKey> = changed.into_iter().collect();
        while let Some(cell) = pending.pop() {
            for dependent in self.dependents_of(cell) {
                if out.insert(dependent) {
                    pending.push(dependent);
                }
            }
        }
        out
    }

    /// Formula cells among `cells` that `cell` reads
    fn formula_precedents(&self, cell: CellKey, cells: &AHashSet<CellKey>) -> Vec<CellKey> {
        let mut out = Vec::new();
        for precedent in self.precedents_of(cell) {
            match precedent {
                Precedent::Cell(key) => {
                    if cells.contains(key) {
                        out.push(*key);
                    }
                }
                Precedent::Area { .. } => {
                    out.extend(cells.iter().copied().filter(|c| precedent.contains(*c)));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Order `cells` so precedents come first, and find the ones on cycles
    ///
    /// Only precedents inside `cells` are ordered; anything else is assumed
    /// current.
    pub fn recalc_order(&self, cells: impl IntoIterator<Item = CellKey>) -> RecalcOrder {
        let cells: AHashSet<CellKey> = cells.into_iter().collect();
        let mut roots: Vec<CellKey> = cells.iter().copied().collect();
        roots.sort_unstable();

        let mut result = RecalcOrder::default();
        let mut visited: AHashSet<CellKey> = AHashSet::new();

        // Iterative DFS: (cell, its formula precedents, next precedent to visit)
        for root in roots {
            if visited.contains(&root) {
                continue;
            }
            visited.insert(root);
            let mut stack = vec![(root, self.formula_precedents(root, &cells), 0usize)];

            while let Some((cell, precedents, next)) = stack.last_mut() {
                let Some(&precedent) = precedents.get(*next) else {
                    result.order.push(*cell);
                    stack.pop();
                    continue;
                };
                *next += 1;

                if let Some(pos) = stack.iter().position(|(c, _, _)| *c == precedent) {
                    tracing::debug!(cell = %precedent, "reference cycle");
                    result.circular.extend(stack[pos..].iter().map(|(c, _, _)| *c));
                } else if visited.insert(precedent) {
                    let grand = self.formula_precedents(precedent, &cells);
                    stack.push((precedent, grand, 0));
                }
            }
        }
        result
    }

    /// Whether `cell` can reach itself through its precedents
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        let cells: AHashSet<CellKey> = self.precedents.keys().copied().collect();
        let mut visited = AHashSet::new();
        let mut pending = self.formula_precedents(cell, &cells);
        while let Some(next) = pending.pop() {
            if next == cell {
                return true;
            }
            if visited.insert(next) {
                pending.extend(self.formula_precedents(next, &cells));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn key(row: u32, col: u16) -> CellKey {
        CellKey::new(0, row, col)
    }

    fn area(text: &str) -> Precedent {
        Precedent::Area {
            sheet: 0,
            range: CellRange::parse(text).unwrap(),
        }
    }

    #[test]
    fn test_collect_references() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.define_name("Rates", "=Data!$B$1:$B$3").unwrap();
        let engine = FormulaEngine::new();

        let ast = engine.parse("=A1+SUM(B1:B3)*Data!C2+Rates+Nowhere!A1").unwrap();
        let refs = collect_references(&ast, 0, &wb, &engine);
        assert_eq!(
            refs.precedents,
            vec![
                Precedent::Cell(key(0, 0)),
                area("B1:B3"),
                Precedent::Cell(CellKey::new(1, 1, 2)),
                Precedent::Area {
                    sheet: 1,
                    range: CellRange::parse("B1:B3").unwrap()
                },
            ]
        );
        assert!(!refs.dynamic);

        let ast = engine.parse("=SUM(A:A)").unwrap();
        let refs = collect_references(&ast, 0, &wb, &engine);
        assert!(refs.precedents[0].contains(key(1_000_000, 0)));
    }

    #[test]
    fn test_dependents_through_areas() {
        let mut graph = DependencyGraph::new();
        graph.set_precedents(key(0, 1), vec![Precedent::Cell(key(0, 0))]);
        graph.set_precedents(key(0, 2), vec![area("A1:A10")]);

        assert_eq!(graph.dependents_of(key(0, 0)), vec![key(0, 1), key(0, 2)]);
        assert_eq!(graph.dependents_of(key(5, 0)), vec![key(0, 2)]);
        assert!(graph.dependents_of(key(11, 0)).is_empty());

        graph.set_precedents(key(0, 1), vec![Precedent::Cell(key(3, 3))]);
        assert_eq!(graph.dependents_of(key(0, 0)), vec![key(0, 2)]);
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        // B1 = A1, C1 = B1, D1 = SUM(B1:C1), E1 = Z9
        graph.set_precedents(key(0, 1), vec![Precedent::Cell(key(0, 0))]);
        graph.set_precedents(key(0, 2), vec![Precedent::Cell(key(0, 1))]);
        graph.set_precedents(key(0, 3), vec![area("B1:C1")]);
        graph.set_precedents(key(0, 4), vec![Precedent::Cell(key(8, 25))]);

        let dirty = graph.transitive_dependents([key(0, 0)]);
        let mut dirty: Vec<_> = dirty.into_iter().collect();
        dirty.sort_unstable();
        assert_eq!(dirty, vec![key(0, 1), key(0, 2), key(0, 3)]);
    }

    #[test]
    fn test_recalc_order() {
        let mut graph = DependencyGraph::new();
        // A3 = A2 + A1, A2 = A1*2, A4 = SUM(A2:A3)
        graph.set_precedents(
            key(2, 0),
            vec![Precedent::Cell(key(1, 0)), Precedent::Cell(key(0, 0))],
        );
        graph.set_precedents(key(1, 0), vec![Precedent::Cell(key(0, 0))]);
        graph.set_precedents(key(3, 0), vec![area("A2:A3")]);

        let result = graph.recalc_order([key(3, 0), key(2, 0), key(1, 0)]);
        assert_eq!(result.order, vec![key(1, 0), key(2, 0), key(3, 0)]);
        assert!(result.circular.is_empty());
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();
        // A1 -> B1 -> C1 -> A1, D1 reads C1
        graph.set_precedents(key(0, 0), vec![Precedent::Cell(key(0, 2))]);
        graph.set_precedents(key(0, 1), vec![Precedent::Cell(key(0, 0))]);
        graph.set_precedents(key(0, 2), vec![Precedent::Cell(key(0, 1))]);
        graph.set_precedents(key(0, 3), vec![Precedent::Cell(key(0, 2))]);

        assert!(graph.has_circular_reference(key(0, 0)));
        assert!(graph.has_circular_reference(key(0, 2)));
        assert!(!graph.has_circular_reference(key(0, 3)));

        let result = graph.recalc_order([key(0, 0), key(0, 1), key(0, 2), key(0, 3)]);
        assert_eq!(result.order.len(), 4);
        assert_eq!(result.circular.len(), 3);
        assert!(!result.circular.contains(&key(0, 3)));
    }
}
