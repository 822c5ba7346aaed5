//! Typed expression trees and their interpreter.
//!
//! Two node types keep trees well-typed by construction: [`BoolExpr`] for
//! predicates and [`NumExpr`] for numeric sub-expressions. A trigger is always a
//! `BoolExpr` root.

use std::fmt;

/// Values visible to an expression at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Env {
    pub t: f64,
    pub macd_diff: f64,
    pub rsi: f64,
}

impl Env {
    pub fn new(t: f64, macd_diff: f64, rsi: f64) -> Self {
        Self { t, macd_diff, rsi }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    T,
    MacdDiff,
    Rsi,
}

impl Var {
    pub const ALL: [Var; 3] = [Var::T, Var::MacdDiff, Var::Rsi];

    pub fn is_indicator(self) -> bool {
        !matches!(self, Var::T)
    }

    fn read(self, env: &Env) -> f64 {
        match self {
            Var::T => env.t,
            Var::MacdDiff => env.macd_diff,
            Var::Rsi => env.rsi,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Var::T => "t",
            Var::MacdDiff => "macd_diff",
            Var::Rsi => "rsi",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumExpr {
    Var(Var),
    Const(f64),
    Add(Box<NumExpr>, Box<NumExpr>),
    Sub(Box<NumExpr>, Box<NumExpr>),
    Mul(Box<NumExpr>, Box<NumExpr>),
    /// Protected division: a zero divisor yields 1.
    Div(Box<NumExpr>, Box<NumExpr>),
    Neg(Box<NumExpr>),
    If(Box<BoolExpr>, Box<NumExpr>, Box<NumExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr {
    Lit(bool),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
    Not(Box<BoolExpr>),
    Lt(Box<NumExpr>, Box<NumExpr>),
    Gt(Box<NumExpr>, Box<NumExpr>),
    Eq(Box<NumExpr>, Box<NumExpr>),
}

pub fn protected_div(left: f64, right: f64) -> f64 {
    if right == 0.0 { 1.0 } else { left / right }
}

impl NumExpr {
    pub fn var(v: Var) -> Self {
        NumExpr::Var(v)
    }

    pub fn eval(&self, env: &Env) -> f64 {
        match self {
            NumExpr::Var(v) => v.read(env),
            NumExpr::Const(c) => *c,
            NumExpr::Add(a, b) => a.eval(env) + b.eval(env),
            NumExpr::Sub(a, b) => a.eval(env) - b.eval(env),
            NumExpr::Mul(a, b) => a.eval(env) * b.eval(env),
            NumExpr::Div(a, b) => protected_div(a.eval(env), b.eval(env)),
            NumExpr::Neg(a) => -a.eval(env),
            NumExpr::If(c, a, b) => {
                if c.eval(env) {
                    a.eval(env)
                } else {
                    b.eval(env)
                }
            }
        }
    }

    /// Longest root-to-leaf edge count; a leaf has height 0.
    pub fn height(&self) -> usize {
        match self {
            NumExpr::Var(_) | NumExpr::Const(_) => 0,
            NumExpr::Neg(a) => 1 + a.height(),
            NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
                1 + a.height().max(b.height())
            }
            NumExpr::If(c, a, b) => 1 + c.height().max(a.height()).max(b.height()),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            NumExpr::Var(_) | NumExpr::Const(_) => 1,
            NumExpr::Neg(a) => 1 + a.size(),
            NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
                1 + a.size() + b.size()
            }
            NumExpr::If(c, a, b) => 1 + c.size() + a.size() + b.size(),
        }
    }

    pub fn uses_indicator(&self) -> bool {
        match self {
            NumExpr::Var(v) => v.is_indicator(),
            NumExpr::Const(_) => false,
            NumExpr::Neg(a) => a.uses_indicator(),
            NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
                a.uses_indicator() || b.uses_indicator()
            }
            NumExpr::If(c, a, b) => c.uses_indicator() || a.uses_indicator() || b.uses_indicator(),
        }
    }
}

impl BoolExpr {
    pub fn lt(a: NumExpr, b: NumExpr) -> Self {
        BoolExpr::Lt(Box::new(a), Box::new(b))
    }

    pub fn gt(a: NumExpr, b: NumExpr) -> Self {
        BoolExpr::Gt(Box::new(a), Box::new(b))
    }

    pub fn and(a: BoolExpr, b: BoolExpr) -> Self {
        BoolExpr::And(Box::new(a), Box::new(b))
    }

    pub fn eval(&self, env: &Env) -> bool {
        match self {
            BoolExpr::Lit(b) => *b,
            BoolExpr::And(a, b) => a.eval(env) && b.eval(env),
            BoolExpr::Or(a, b) => a.eval(env) || b.eval(env),
            BoolExpr::Not(a) => !a.eval(env),
            BoolExpr::Lt(a, b) => a.eval(env) < b.eval(env),
            BoolExpr::Gt(a, b) => a.eval(env) > b.eval(env),
            BoolExpr::Eq(a, b) => a.eval(env) == b.eval(env),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            BoolExpr::Lit(_) => 0,
            BoolExpr::Not(a) => 1 + a.height(),
            BoolExpr::And(a, b) | BoolExpr::Or(a, b) => 1 + a.height().max(b.height()),
            BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => {
                1 + a.height().max(b.height())
            }
        }
    }

    pub fn size(&self) -> usize {
        match self {
            BoolExpr::Lit(_) => 1,
            BoolExpr::Not(a) => 1 + a.size(),
            BoolExpr::And(a, b) | BoolExpr::Or(a, b) => 1 + a.size() + b.size(),
            BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => {
                1 + a.size() + b.size()
            }
        }
    }

    pub fn uses_indicator(&self) -> bool {
        match self {
            BoolExpr::Lit(_) => false,
            BoolExpr::Not(a) => a.uses_indicator(),
            BoolExpr::And(a, b) | BoolExpr::Or(a, b) => a.uses_indicator() || b.uses_indicator(),
            BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => {
                a.uses_indicator() || b.uses_indicator()
            }
        }
    }
}

/// Node kind at a preorder position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Bool,
    Num,
}

/// Mutable handle to one node of a tree.
#[derive(Debug)]
pub enum NodeMut<'a> {
    Bool(&'a mut BoolExpr),
    Num(&'a mut NumExpr),
}

impl NodeMut<'_> {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeMut::Bool(_) => NodeType::Bool,
            NodeMut::Num(_) => NodeType::Num,
        }
    }
}

/// Owned subtree of either type, used to move material between trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Subtree {
    Bool(BoolExpr),
    Num(NumExpr),
}

impl Subtree {
    pub fn node_type(&self) -> NodeType {
        match self {
            Subtree::Bool(_) => NodeType::Bool,
            Subtree::Num(_) => NodeType::Num,
        }
    }
}

impl BoolExpr {
    /// Node types in preorder; index `i` addresses the same node as [`BoolExpr::node_mut`].
    pub fn node_types(&self) -> Vec<NodeType> {
        let mut out = Vec::with_capacity(self.size());
        collect_bool(self, &mut out);
        out
    }

    /// The `index`-th node in preorder.
    pub fn node_mut(&mut self, index: usize) -> Option<NodeMut<'_>> {
        let mut remaining = index;
        nth_bool(self, &mut remaining)
    }

    pub fn subtree(&mut self, index: usize) -> Option<Subtree> {
        Some(match self.node_mut(index)? {
            NodeMut::Bool(b) => Subtree::Bool(b.clone()),
            NodeMut::Num(n) => Subtree::Num(n.clone()),
        })
    }

    /// Replaces the `index`-th node. Fails when the index is out of range or the
    /// replacement has the wrong type.
    pub fn replace(&mut self, index: usize, with: Subtree) -> bool {
        match (self.node_mut(index), with) {
            (Some(NodeMut::Bool(slot)), Subtree::Bool(b)) => {
                *slot = b;
                true
            }
            (Some(NodeMut::Num(slot)), Subtree::Num(n)) => {
                *slot = n;
                true
            }
            _ => false,
        }
    }
}

fn collect_bool(e: &BoolExpr, out: &mut Vec<NodeType>) {
    out.push(NodeType::Bool);
    match e {
        BoolExpr::Lit(_) => {}
        BoolExpr::Not(a) => collect_bool(a, out),
        BoolExpr::And(a, b) | BoolExpr::Or(a, b) => {
            collect_bool(a, out);
            collect_bool(b, out);
        }
        BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => {
            collect_num(a, out);
            collect_num(b, out);
        }
    }
}

fn collect_num(e: &NumExpr, out: &mut Vec<NodeType>) {
    out.push(NodeType::Num);
    match e {
        NumExpr::Var(_) | NumExpr::Const(_) => {}
        NumExpr::Neg(a) => collect_num(a, out),
        NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
            collect_num(a, out);
            collect_num(b, out);
        }
        NumExpr::If(c, a, b) => {
            collect_bool(c, out);
            collect_num(a, out);
            collect_num(b, out);
        }
    }
}

fn nth_bool<'a>(e: &'a mut BoolExpr, n: &mut usize) -> Option<NodeMut<'a>> {
    if *n == 0 {
        return Some(NodeMut::Bool(e));
    }
    *n -= 1;
    match e {
        BoolExpr::Lit(_) => None,
        BoolExpr::Not(a) => nth_bool(a, n),
        BoolExpr::And(a, b) | BoolExpr::Or(a, b) => match nth_bool(a, n) {
            Some(found) => Some(found),
            None => nth_bool(b, n),
        },
        BoolExpr::Lt(a, b) | BoolExpr::Gt(a, b) | BoolExpr::Eq(a, b) => match nth_num(a, n) {
            Some(found) => Some(found),
            None => nth_num(b, n),
        },
    }
}

fn nth_num<'a>(e: &'a mut NumExpr, n: &mut usize) -> Option<NodeMut<'a>> {
    if *n == 0 {
        return Some(NodeMut::Num(e));
    }
    *n -= 1;
    match e {
        NumExpr::Var(_) | NumExpr::Const(_) => None,
        NumExpr::Neg(a) => nth_num(a, n),
        NumExpr::Add(a, b) | NumExpr::Sub(a, b) | NumExpr::Mul(a, b) | NumExpr::Div(a, b) => {
            match nth_num(a, n) {
                Some(found) => Some(found),
                None => nth_num(b, n),
            }
        }
        NumExpr::If(c, a, b) => match nth_bool(c, n) {
            Some(found) => Some(found),
            None => match nth_num(a, n) {
                Some(found) => Some(found),
                None => nth_num(b, n),
            },
        },
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumExpr::Var(v) => write!(f, "{}", v),
            NumExpr::Const(c) => write!(f, "{}", c),
            NumExpr::Add(a, b) => write!(f, "add({}, {})", a, b),
            NumExpr::Sub(a, b) => write!(f, "sub({}, {})", a, b),
            NumExpr::Mul(a, b) => write!(f, "mul({}, {})", a, b),
            NumExpr::Div(a, b) => write!(f, "protected_div({}, {})", a, b),
            NumExpr::Neg(a) => write!(f, "neg({})", a),
            NumExpr::If(c, a, b) => write!(f, "if_then_else({}, {}, {})", c, a, b),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::Lit(b) => write!(f, "{}", b),
            BoolExpr::And(a, b) => write!(f, "and({}, {})", a, b),
            BoolExpr::Or(a, b) => write!(f, "or({}, {})", a, b),
            BoolExpr::Not(a) => write!(f, "not({})", a),
            BoolExpr::Lt(a, b) => write!(f, "lt({}, {})", a, b),
            BoolExpr::Gt(a, b) => write!(f, "gt({}, {})", a, b),
            BoolExpr::Eq(a, b) => write!(f, "eq({}, {})", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi_below(level: f64) -> BoolExpr {
        BoolExpr::lt(NumExpr::var(Var::Rsi), NumExpr::Const(level))
    }

    #[test]
    fn evaluates_comparisons_and_logic() {
        let env = Env::new(5.0, 0.3, 25.0);
        assert!(rsi_below(30.0).eval(&env));
        assert!(!rsi_below(20.0).eval(&env));

        let both = BoolExpr::and(
            rsi_below(30.0),
            BoolExpr::gt(NumExpr::var(Var::MacdDiff), NumExpr::Const(0.0)),
        );
        assert!(both.eval(&env));
        assert!(!BoolExpr::Not(Box::new(both)).eval(&env));
    }

    #[test]
    fn protected_division_returns_one_on_zero() {
        let div = NumExpr::Div(
            Box::new(NumExpr::Const(7.0)),
            Box::new(NumExpr::var(Var::MacdDiff)),
        );
        assert_eq!(div.eval(&Env::new(0.0, 0.0, 0.0)), 1.0);
        assert_eq!(div.eval(&Env::new(0.0, 2.0, 0.0)), 3.5);
    }

    #[test]
    fn if_then_else_selects_branch() {
        let e = NumExpr::If(
            Box::new(BoolExpr::Lit(false)),
            Box::new(NumExpr::Const(1.0)),
            Box::new(NumExpr::Neg(Box::new(NumExpr::var(Var::T)))),
        );
        assert_eq!(e.eval(&Env::new(4.0, 0.0, 0.0)), -4.0);
    }

    #[test]
    fn height_size_and_indicator_use() {
        let leaf = BoolExpr::Lit(true);
        assert_eq!(leaf.height(), 0);
        assert_eq!(leaf.size(), 1);
        assert!(!leaf.uses_indicator());

        let e = rsi_below(30.0);
        assert_eq!(e.height(), 1);
        assert_eq!(e.size(), 3);
        assert!(e.uses_indicator());

        let time_only = BoolExpr::gt(NumExpr::var(Var::T), NumExpr::Const(3.0));
        assert!(!time_only.uses_indicator());
    }

    #[test]
    fn preorder_addressing() {
        // and(lt(rsi, 30), true)
        let mut e = BoolExpr::and(rsi_below(30.0), BoolExpr::Lit(true));
        assert_eq!(
            e.node_types(),
            vec![
                NodeType::Bool,
                NodeType::Bool,
                NodeType::Num,
                NodeType::Num,
                NodeType::Bool
            ]
        );
        assert_eq!(e.subtree(3), Some(Subtree::Num(NumExpr::Const(30.0))));
        assert_eq!(e.subtree(4), Some(Subtree::Bool(BoolExpr::Lit(true))));
        assert_eq!(e.subtree(5), None);

        assert!(!e.replace(2, Subtree::Bool(BoolExpr::Lit(false))));
        assert!(e.replace(3, Subtree::Num(NumExpr::Const(40.0))));
        assert_eq!(e.to_string(), "and(lt(rsi, 40), true)");
    }

    #[test]
    fn display_is_prefix_notation() {
        let e = BoolExpr::and(
            rsi_below(30.0),
            BoolExpr::gt(NumExpr::var(Var::MacdDiff), NumExpr::Const(-2.5)),
        );
        assert_eq!(e.to_string(), "and(lt(rsi, 30), gt(macd_diff, -2.5))");
    }
}
