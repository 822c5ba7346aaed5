//! Variation operators on single trees.

use rand::Rng;
use rand::seq::SliceRandom;

use super::generate::{self, DepthRange, Method};
use super::tree::{BoolExpr, NodeMut, NumExpr, Var};

/// Depth of the replacement grown by [`mutate_subtree`].
pub const SUBTREE_DEPTH: DepthRange = DepthRange::new(0, 2);

/// Replaces one random node with a random subtree of the same type, built with
/// the full method at depth 0..=2.
pub fn mutate_subtree<R: Rng + ?Sized>(tree: &mut BoolExpr, rng: &mut R) {
    let types = tree.node_types();
    let index = rng.gen_range(0..types.len());
    let replacement = generate::generate_subtree(types[index], Method::Full, SUBTREE_DEPTH, rng);
    tree.replace(index, replacement);
}

/// Swaps one random node for a primitive or terminal of the same type and arity,
/// keeping its children.
pub fn mutate_node<R: Rng + ?Sized>(tree: &mut BoolExpr, rng: &mut R) {
    let index = rng.gen_range(0..tree.size());
    match tree.node_mut(index) {
        Some(NodeMut::Bool(node)) => replace_bool_node(node, rng),
        Some(NodeMut::Num(node)) => replace_num_node(node, rng),
        None => {}
    }
}

fn replace_bool_node<R: Rng + ?Sized>(node: &mut BoolExpr, rng: &mut R) {
    let placeholder = BoolExpr::Lit(false);
    *node = match std::mem::replace(node, placeholder) {
        BoolExpr::Lit(_) => generate::bool_terminal(rng),
        BoolExpr::And(a, b) | BoolExpr::Or(a, b) => {
            if rng.gen_bool(0.5) {
                BoolExpr::And(a, b)
            } else {
                BoolExpr::Or(a, b)
            }
        }
        BoolExpr::Not(a) => BoolExpr::Not(a),
        BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => match rng.gen_range(0..3) {
            0 => BoolExpr::Lt(a, b),
            1 => BoolExpr::Gt(a, b),
            _ => BoolExpr::Eq(a, b),
        },
    };
}

fn replace_num_node<R: Rng + ?Sized>(node: &mut NumExpr, rng: &mut R) {
    let placeholder = NumExpr::Const(0.0);
    *node = match std::mem::replace(node, placeholder) {
        NumExpr::Var(_) | NumExpr::Const(_) => generate::num_terminal(rng),
        NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
            match rng.gen_range(0..4) {
                0 => NumExpr::Add(a, b),
                1 => NumExpr::Sub(a, b),
                2 => NumExpr::Mul(a, b),
                _ => NumExpr::Div(a, b),
            }
        }
        NumExpr::Neg(a) => NumExpr::Neg(a),
        NumExpr::If(c, a, b) => NumExpr::If(c, a, b),
    };
}

/// Picks one of the two mutation operators with equal probability.
pub fn mutate<R: Rng + ?Sized>(tree: &mut BoolExpr, rng: &mut R) {
    if rng.gen_bool(0.5) {
        mutate_node(tree, rng);
    } else {
        mutate_subtree(tree, rng);
    }
}

/// One-point crossover: swaps a random subtree of `a` with a random subtree of
/// `b` of the same type. Leaves both untouched when no type matches.
pub fn crossover<R: Rng + ?Sized>(a: &mut BoolExpr, b: &mut BoolExpr, rng: &mut R) {
    let a_types = a.node_types();
    let b_types = b.node_types();
    if a_types.len() < 2 && b_types.len() < 2 {
        return;
    }

    // The root is skipped when the tree has other nodes, so a swap exchanges material
    // instead of whole trees.
    let a_start = usize::from(a_types.len() > 1);
    let i = rng.gen_range(a_start..a_types.len());
    let wanted = a_types[i];
    let b_start = usize::from(b_types.len() > 1);
    let candidates: Vec<usize> = (b_start..b_types.len())
        .filter(|&j| b_types[j] == wanted)
        .collect();
    let Some(&j) = candidates.choose(rng) else {
        return;
    };

    if let (Some(from_a), Some(from_b)) = (a.subtree(i), b.subtree(j)) {
        a.replace(i, from_b);
        b.replace(j, from_a);
    }
}

/// `rsi < 30`, the buy side used when only the sell side is evolved.
pub fn default_buy() -> BoolExpr {
    BoolExpr::lt(NumExpr::var(Var::Rsi), NumExpr::Const(30.0))
}

/// `rsi > 70`, the sell side used when only the buy side is evolved.
pub fn default_sell() -> BoolExpr {
    BoolExpr::gt(NumExpr::var(Var::Rsi), NumExpr::Const(70.0))
}
