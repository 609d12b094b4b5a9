use std::collections::HashSet;

use crate::{listing::Position, prelude::*};

use super::{Instruction, Symbol, TacListing};

/// Which optional passes the optimiser runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Remove instructions whose results are never used.
    pub eliminate_dead_code: bool,
}
impl Options {
    pub fn with_dead_code_elimination() -> Self {
        Self {
            eliminate_dead_code: true,
        }
    }
}

/// Optimise a method listing. `roots` are the symbols whose values are needed after the
/// listing ends, such as the method's result.
pub fn optimise(listing: TacListing, roots: &[Symbol], options: &Options) -> TacListing {
    let mut optimiser = Optimiser::new(listing);
    optimiser.coalesce_phis();
    if options.eliminate_dead_code {
        optimiser.eliminate_dead_code(roots);
    }
    optimiser.listing
}

struct Optimiser {
    listing: TacListing,
}
impl Optimiser {
    pub fn new(listing: TacListing) -> Self {
        Self { listing }
    }

    /// Remove all ɸ-functions, by storing every value a ɸ-function merges in its target.
    /// Optimises:
    /// ```text
    /// %t4 = 4
    /// ...
    /// %t5 = 3
    /// ...
    /// %t0 = ɸ(%t4, %t5)
    /// ```
    /// To:
    /// ```text
    /// %t0 = 4
    /// ...
    /// %t0 = 3
    /// ...
    /// ```
    /// Reads of the merged values are renamed as well, so values defined after the
    /// ɸ-function (those coming in over a loop's back edge) end up in the same place.
    ///
    /// A merged value with no definition in the listing comes from outside it, as in a case
    /// branch merging a value of the enclosing method. The target is loaded with that value
    /// at the start of the listing instead.
    fn coalesce_phis(&mut self) {
        let mut position = self.listing.end();
        let mut coalesced = 0;

        while let Some(previous) = position.previous() {
            position = previous;

            let phi = self
                .listing
                .get(position)
                .and_then(Instruction::as_phi)
                .map(|(target, first, second)| (target.clone(), first.clone(), second.clone()));

            if let Some((target, first, second)) = phi {
                trace!("{}: coalesce {} and {} into {}", position, first, second, target);
                let mut incoming: Vec<Symbol> = [&first, &second]
                    .into_iter()
                    .filter(|operand| operand.is_storage() && **operand != target)
                    .filter(|operand| !self.defines(operand))
                    .cloned()
                    .collect();
                incoming.dedup();

                self.listing.remove(position);
                self.rename(&first, &target);
                self.rename(&second, &target);

                for operand in incoming {
                    trace!("{} is defined outside the listing, load it on entry", operand);
                    self.listing
                        .insert(Position(0), Instruction::assign(target.clone(), operand));
                    position = position + 1;
                }
                coalesced += 1;
            }
        }

        debug!("Coalesced {} ɸ-functions", coalesced);
    }

    fn defines(&self, symbol: &Symbol) -> bool {
        self.listing
            .iter_instructions()
            .any(|instr| instr.write() == Some(symbol))
    }

    fn rename(&mut self, src: &Symbol, dest: &Symbol) {
        if src == dest {
            return;
        }
        for instr in self.listing.iter_instructions_mut() {
            instr.rename(src, dest);
        }
    }

    /// Remove instructions that have no observable effect and whose result is not needed to
    /// compute one of the `roots` or an instruction that does have an effect.
    fn eliminate_dead_code(&mut self, roots: &[Symbol]) {
        let mut live = vec![false; self.listing.len()];
        let mut worklist = roots.to_vec();

        for (position, instr) in self.listing.iter_lines() {
            if instr.op.has_side_effect() {
                live[position.0] = true;
                worklist.extend(instr.reads());
            }
        }
        self.mark_symbols_live(worklist, &mut live);

        let before = self.listing.len();
        self.listing.retain_lines(|position, _| live[position.0]);
        debug!("Removed {} dead instructions", before - self.listing.len());
    }

    /// Mark every instruction that defines a symbol on the worklist as live, and add the
    /// symbols it reads in turn. A symbol may have more than one definition once ɸ-functions
    /// have been coalesced.
    fn mark_symbols_live(&self, mut worklist: Vec<Symbol>, live: &mut [bool]) {
        let mut visited = HashSet::new();

        while let Some(symbol) = worklist.pop() {
            if !visited.insert(symbol.clone()) {
                continue;
            }

            for (position, instr) in self.listing.iter_lines().rev() {
                if instr.write() == Some(&symbol) {
                    live[position.0] = true;
                    worklist.extend(instr.reads());
                }
            }
        }
    }
}
