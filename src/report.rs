//! CSV export of propagated bounds for the parameter-selection stage.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::graph::Graph;
use crate::propagate::NoiseBounds;

#[derive(Serialize)]
struct Row {
    op: usize,
    kind: String,
    class: &'static str,
    location: String,
    squared_bound: String,
    manp: String,
    output: bool,
}

/// Write one row per operation, in id order.
pub fn write_csv<W: Write>(writer: W, graph: &Graph, bounds: &NoiseBounds) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for op in graph.operations() {
        let Some(bound) = bounds.get(op.id()) else {
            continue;
        };
        wtr.serialize(Row {
            op: op.id().index(),
            kind: op.kind().to_string(),
            class: op.class().name(),
            location: op.location().to_string(),
            squared_bound: bound.to_string(),
            manp: bound.manp().to_string(),
            output: graph.is_output(op.id()),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ClearConstant, GraphBuilder, Location};
    use crate::kind::OpKind;
    use crate::propagate::propagate;
    use crate::registry::Registry;
    use crate::types::{IntegerType, ValueType};

    #[test]
    fn test_csv_rows() {
        let reg = Registry::default();
        let ty = ValueType::encrypted(IntegerType::unsigned(4).unwrap());
        let mut b = GraphBuilder::new(&reg);
        let x = b.add_input(ty.clone(), "f.py:2".parse().unwrap()).unwrap();
        let k = ClearConstant::scalar(IntegerType::unsigned(4).unwrap(), 3).unwrap();
        let m = b.add_op(OpKind::MulEintInt, vec![x.into(), k.into()], ty, Location::Unknown).unwrap();
        b.tag_output(m).unwrap();
        let g = b.build();
        let bounds = propagate(&g).unwrap();

        let mut out = Vec::new();
        write_csv(&mut out, &g, &bounds).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "op,kind,class,location,squared_bound,manp,output");
        assert_eq!(lines[1], "0,input,constant,f.py:2,1,1,false");
        assert_eq!(lines[2], "1,mul_eint_int,custom_binary,,9,3,true");
    }
}
