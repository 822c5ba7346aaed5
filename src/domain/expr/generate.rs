//! Random tree generation: full, grow and ramped half-and-half.

use rand::Rng;

use super::tree::{BoolExpr, NodeType, NumExpr, Subtree, Var};

/// Ephemeral constants are integers drawn from this range.
pub const CONST_MIN: i32 = -100;
pub const CONST_MAX: i32 = 100;

/// Chance that `grow` stops early at a node, once the minimum depth is reached.
/// Six terminals (`t`, `macd_diff`, `rsi`, constants, `true`, `false`) against
/// twelve primitives.
const TERMINAL_RATIO: f64 = 6.0 / 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Every branch reaches exactly the target depth.
    Full,
    /// Branches may stop at a terminal before the target depth.
    Grow,
}

/// Inclusive depth range for a newly generated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRange {
    pub min: usize,
    pub max: usize,
}

impl DepthRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

struct Plan {
    method: Method,
    min: usize,
    target: usize,
}

impl Plan {
    fn new<R: Rng + ?Sized>(method: Method, depth: DepthRange, rng: &mut R) -> Self {
        let max = depth.max.max(depth.min);
        Self {
            method,
            min: depth.min,
            target: rng.gen_range(depth.min..=max),
        }
    }

    fn stop_here<R: Rng + ?Sized>(&self, depth: usize, rng: &mut R) -> bool {
        match self.method {
            Method::Full => depth >= self.target,
            Method::Grow => {
                depth >= self.target || (depth >= self.min && rng.gen_bool(TERMINAL_RATIO))
            }
        }
    }
}

pub fn generate_bool<R: Rng + ?Sized>(method: Method, depth: DepthRange, rng: &mut R) -> BoolExpr {
    let plan = Plan::new(method, depth, rng);
    bool_node(&plan, 0, rng)
}

pub fn generate_num<R: Rng + ?Sized>(method: Method, depth: DepthRange, rng: &mut R) -> NumExpr {
    let plan = Plan::new(method, depth, rng);
    num_node(&plan, 0, rng)
}

/// Coin flip between grow and full.
pub fn half_and_half<R: Rng + ?Sized>(depth: DepthRange, rng: &mut R) -> BoolExpr {
    let method = if rng.gen_bool(0.5) {
        Method::Grow
    } else {
        Method::Full
    };
    generate_bool(method, depth, rng)
}

pub fn generate_subtree<R: Rng + ?Sized>(
    node_type: NodeType,
    method: Method,
    depth: DepthRange,
    rng: &mut R,
) -> Subtree {
    match node_type {
        NodeType::Bool => Subtree::Bool(generate_bool(method, depth, rng)),
        NodeType::Num => Subtree::Num(generate_num(method, depth, rng)),
    }
}

pub fn random_constant<R: Rng + ?Sized>(rng: &mut R) -> NumExpr {
    NumExpr::Const(rng.gen_range(CONST_MIN..=CONST_MAX) as f64)
}

pub fn bool_terminal<R: Rng + ?Sized>(rng: &mut R) -> BoolExpr {
    BoolExpr::Lit(rng.gen_bool(0.5))
}

pub fn num_terminal<R: Rng + ?Sized>(rng: &mut R) -> NumExpr {
    match rng.gen_range(0..=Var::ALL.len()) {
        i if i < Var::ALL.len() => NumExpr::Var(Var::ALL[i]),
        _ => random_constant(rng),
    }
}

fn bool_node<R: Rng + ?Sized>(plan: &Plan, depth: usize, rng: &mut R) -> BoolExpr {
    if plan.stop_here(depth, rng) {
        return bool_terminal(rng);
    }
    let d = depth + 1;
    match rng.gen_range(0..6) {
        0 => BoolExpr::And(
            Box::new(bool_node(plan, d, rng)),
            Box::new(bool_node(plan, d, rng)),
        ),
        1 => BoolExpr::Or(
            Box::new(bool_node(plan, d, rng)),
            Box::new(bool_node(plan, d, rng)),
        ),
        2 => BoolExpr::Not(Box::new(bool_node(plan, d, rng))),
        3 => BoolExpr::Lt(
            Box::new(num_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
        ),
        4 => BoolExpr::Gt(
            Box::new(num_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
        ),
        _ => BoolExpr::Eq(
            Box::new(num_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
        ),
    }
}

fn num_node<R: Rng + ?Sized>(plan: &Plan, depth: usize, rng: &mut R) -> NumExpr {
    if plan.stop_here(depth, rng) {
        return num_terminal(rng);
    }
    let d = depth + 1;
    let pair = |rng: &mut R| {
        (
            Box::new(num_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
        )
    };
    match rng.gen_range(0..6) {
        0 => {
            let (a, b) = pair(rng);
            NumExpr::Add(a, b)
        }
        1 => {
            let (a, b) = pair(rng);
            NumExpr::Sub(a, b)
        }
        2 => {
            let (a, b) = pair(rng);
            NumExpr::Mul(a, b)
        }
        3 => {
            let (a, b) = pair(rng);
            NumExpr::Div(a, b)
        }
        4 => NumExpr::Neg(Box::new(num_node(plan, d, rng))),
        _ => NumExpr::If(
            Box::new(bool_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
            Box::new(num_node(plan, d, rng)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn full_trees_reach_exact_depth() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let tree = generate_bool(Method::Full, DepthRange::new(2, 2), &mut rng);
            assert_eq!(tree.height(), 2, "{tree}");
        }
    }

    #[test]
    fn grow_trees_stay_within_range() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let tree = generate_bool(Method::Grow, DepthRange::new(1, 3), &mut rng);
            assert!(tree.height() <= 3, "{tree}");
            assert!(tree.height() >= 1, "{tree}");
        }
    }

    #[test]
    fn depth_zero_gives_terminals() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let n = generate_num(Method::Full, DepthRange::new(0, 0), &mut rng);
            assert!(matches!(n, NumExpr::Var(_) | NumExpr::Const(_)));
        }
    }

    #[test]
    fn constants_are_integers_in_range() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            if let NumExpr::Const(c) = random_constant(&mut rng) {
                assert_eq!(c.fract(), 0.0);
                assert!((CONST_MIN as f64..=CONST_MAX as f64).contains(&c));
            }
        }
    }

    #[test]
    fn half_and_half_is_seed_deterministic() {
        let a = half_and_half(DepthRange::new(1, 2), &mut StdRng::seed_from_u64(9));
        let b = half_and_half(DepthRange::new(1, 2), &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn subtree_has_requested_type() {
        let mut rng = StdRng::seed_from_u64(5);
        let s = generate_subtree(NodeType::Num, Method::Full, DepthRange::new(0, 2), &mut rng);
        assert_eq!(s.node_type(), NodeType::Num);
    }
}
