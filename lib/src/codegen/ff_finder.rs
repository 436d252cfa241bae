use log::debug;

use crate::ast::{Arena, ByteClass, NodeId, NodeKind};

use super::CompileContext;

/// A filter whose probes cover the whole alphabet accepts every position
/// and is worse than no filter at all.
const FF_USELESS_COST: u32 = 256;

/// Selects the fast-forward elements: the subset of matching leaves usable
/// as a cheap prefilter for skipping input that cannot begin a match.
///
/// Works on the flattened lists, not the tree. Eligible elements are the
/// leaves whose entry state is zero-width-reachable from the expression's
/// entry (the only leaves able to consume the first byte of a match), so a
/// position failing every probe provably starts no match. Assertions are
/// skipped over, never selected: a pure position check cannot filter input.
/// Nullable expressions disable the prefilter entirely, a zero-width match
/// can begin at any position.
pub(crate) struct FfFinder<'a> {
    ctx: &'a mut CompileContext,
}

impl<'a> FfFinder<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        Self { ctx }
    }

    pub fn find_ff_elements(&mut self) {
        let reachable = self.ctx.zero_width_reachable(false);

        if reachable[self.ctx.output_state() as usize] {
            debug!("nullable expression, no fast-forward");
            return;
        }

        let mut list: Vec<NodeId> = self
            .ctx
            .matching
            .iter()
            .copied()
            .filter(|id| {
                reachable[self.ctx.arena.node(*id).entry_state as usize]
            })
            .collect();

        if list.is_empty() {
            return;
        }

        let mut start = 0;
        let mut end = list.len();
        self.ff_alternation_reduce(&mut list, &mut start, &mut end);

        if block_cost(&self.ctx.arena, &list[start..end]) >= FF_USELESS_COST {
            debug!("fast-forward block covers the alphabet, dropped");
            return;
        }

        debug!("{} fast-forward element(s)", end - start);
        self.ctx.ff_elements = list[start..end].to_vec();
    }

    /// Narrows a block of alternative elements to a smaller, equally
    /// precise one when possible: an element whose probe signature is
    /// already covered by the elements before it adds no selectivity
    /// (branches sharing a common first literal byte collapse into one
    /// probe). Redundant elements are moved behind `end` and the block is
    /// cut there when [`FfFinder::ff_reduce_cmp`] estimates the narrowed
    /// range as the cheaper one.
    pub fn ff_alternation_reduce(
        &self,
        list: &mut Vec<NodeId>,
        start: &mut usize,
        end: &mut usize,
    ) {
        let mut seen = ByteClass::empty();
        let mut kept = Vec::with_capacity(*end - *start);
        let mut redundant = Vec::new();

        for id in list[*start..*end].iter() {
            let signature = probe_signature(&self.ctx.arena, *id);
            if seen.contains_all(&signature) {
                redundant.push(*id);
            } else {
                seen.union_with(&signature);
                kept.push(*id);
            }
        }

        if redundant.is_empty() {
            return;
        }

        let cut = *start + kept.len();
        list.splice(*start..*end, kept.into_iter().chain(redundant));

        // The leading range subsumes the redundant tail's coverage, so
        // unless the comparison favors the tail outright, the narrowed
        // block is equally precise and stands alone.
        if self.ff_reduce_cmp(list, *start, cut) <= 0 {
            *end = cut;
        }
    }

    /// Compares the estimated filter cost of `[i1, i2)` against
    /// `[i2, end)`. A positive result means the first range is the more
    /// efficient filter. The cost model is a heuristic: the number of
    /// distinct bytes a block's probes accept, i.e. an estimate of how
    /// often the skip loop stops.
    pub fn ff_reduce_cmp(&self, list: &[NodeId], i1: usize, i2: usize) -> i32 {
        let first = block_cost(&self.ctx.arena, &list[i1..i2]);
        let second = block_cost(&self.ctx.arena, &list[i2..]);
        second as i32 - first as i32
    }
}

/// The set of bytes an element's single-position probe accepts. A literal
/// run is probed by its first byte only; the main loop verifies the rest.
fn probe_signature(arena: &Arena, id: NodeId) -> ByteClass {
    match &arena.node(id).kind {
        NodeKind::Literal(bytes) => {
            let mut signature = ByteClass::empty();
            signature.insert(bytes[0]);
            signature
        }
        NodeKind::Class(class) => *class,
        NodeKind::AnyByte => {
            let mut signature = ByteClass::empty();
            signature.insert_range(0, 255);
            signature
        }
        kind => unreachable!("non-matching fast-forward candidate: {:?}", kind),
    }
}

fn block_cost(arena: &Arena, block: &[NodeId]) -> u32 {
    let mut accepted = ByteClass::empty();
    for id in block {
        accepted.union_with(&probe_signature(arena, *id));
    }
    accepted.count()
}
