//! `pass` — an identity operator. Used as an explicit join point after a
//! `merge`/parallel fan-out so the flowgraph always has a single terminal
//! operator to attach the next stage (or the driver) to.

use crate::error::Result;
use crate::proc::Proc;
use zq_stream::Batch;

pub struct Pass {
    upstream: Box<dyn Proc>,
}

impl Pass {
    pub fn new(upstream: Box<dyn Proc>) -> Self {
        Pass { upstream }
    }
}

impl Proc for Pass {
    fn pull(&mut self) -> Result<Option<Batch>> {
        self.upstream.pull()
    }

    fn done(&mut self) {
        self.upstream.done();
    }
}
