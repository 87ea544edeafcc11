use std::fs::File;
use std::io::BufWriter;
use std::time::SystemTime;

use memory_stats::memory_stats;
use tracing_flame::FlameLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use clrvm::dispatch::{DispatchResult, DispatchTableBuilder};
use clrvm::dominator::{ControlFlowGraph, DominatorTree};
use clrvm::frame::Frame;
use clrvm::handlers::binary_op::{Arith, BinaryOpHandler, Mode};
use clrvm::handlers::branch::{Condition, ConditionalBranchHandler, UnconditionalBranchHandler};
use clrvm::heap::{HeapConfig, ManagedObjectHeap};
use clrvm::indices::{Address, PointerWidth};
use clrvm::machine::{ExecutionContext, Machine};
use clrvm::opcode::{Instruction, OpCode, Operand};
use clrvm::signature::GenericContext;
use clrvm::stack::StackSlot;
use clrvm::value_factory::{PrimitiveSizes, ValueFactory, ValueFactoryConfig};

fn setup_global_subscriber() -> impl Drop {
	let file = File::create("./trace.folded").unwrap();
	let flame_layer = FlameLayer::new(BufWriter::new(file)).with_file_and_line(false);
	let guard = flame_layer.flush_on_drop();

	let subscriber = Registry::default().with(flame_layer);

	tracing::subscriber::set_global_default(subscriber).expect("Could not set global default");
	guard
}

/// A diamond CFG (`A -> B, A -> C, B -> D, C -> D`), scaled up by `width`
/// parallel diamonds to give the dominator-tree construction something to
/// chew on.
struct DiamondChain {
	width: u32,
}

impl ControlFlowGraph for DiamondChain {
	type Node = u32;

	fn entrypoint(&self) -> u32 {
		0
	}

	fn successors(&self, node: u32) -> Vec<u32> {
		if self.width == 0 {
			return Vec::new();
		}
		let stride = 3;
		let base = node / stride * stride;
		match node % stride {
			0 if node / stride < self.width => vec![base + 1, base + 2],
			1 | 2 => vec![base + stride],
			_ => Vec::new(),
		}
	}

	fn predecessors(&self, node: u32) -> Vec<u32> {
		if self.width == 0 || node == 0 {
			return Vec::new();
		}
		let stride = 3;
		let base = node / stride * stride;
		match node % stride {
			0 => vec![base - 2, base - 1],
			1 | 2 => vec![base],
			_ => Vec::new(),
		}
	}
}

fn build_dominator_tree(width: u32) -> DominatorTree<u32> {
	DominatorTree::build(&DiamondChain { width })
}

/// A synthetic method body: push two constants, `add` them `iterations`
/// times, looping back with `br` until a counter local hits zero.
fn build_machine() -> Machine {
	let factory = ValueFactory::new(ValueFactoryConfig {
		object_header_size: 16,
		pointer_width: PointerWidth::Bits64,
		primitive_sizes: PrimitiveSizes::default(),
	});
	let heap = ManagedObjectHeap::new(HeapConfig { max_size: 1 << 20, base: Address(0) }, factory);

	let mut builder = DispatchTableBuilder::new();
	builder.register(BinaryOpHandler::new(Arith::Add, Mode::Plain { signed: true }, vec![OpCode::add.into()])).unwrap();
	builder.register(BinaryOpHandler::new(Arith::Sub, Mode::Plain { signed: true }, vec![OpCode::sub.into()])).unwrap();
	builder.register(ConditionalBranchHandler::new(Condition::True, vec![OpCode::brtrue.into()])).unwrap();
	builder.register(UnconditionalBranchHandler::new(vec![OpCode::br.into()])).unwrap();

	Machine::new(heap, builder.build())
}

/// Runs `iterations` steps of `push 1; push 1; add; pop` through the step
/// loop, exercising `ExecutionContext::step` the way a real interpreter
/// driver would.
fn run_step_loop(machine: &mut Machine, iterations: u32) {
	let program = [Instruction::new(OpCode::add, Operand::None), Instruction::new(OpCode::sub, Operand::None)];

	let mut frame = Frame::new(Vec::new(), GenericContext::empty());
	for _ in 0..iterations {
		frame.push(StackSlot::integer(1, 32));
		frame.push(StackSlot::integer(1, 32));
		frame.set_ip(0);

		let mut ctx = ExecutionContext::new(machine, frame);
		let result = ctx.step(&program[0]).unwrap();
		debug_assert_eq!(result, DispatchResult::Success);
		ctx.frame_mut().push(StackSlot::integer(1, 32));
		let result = ctx.step(&program[1]).unwrap();
		debug_assert_eq!(result, DispatchResult::Success);
		let _ = ctx.frame_mut().pop().unwrap();
		frame = ctx.into_frame();
	}
}

fn main() {
	let _guard = setup_global_subscriber();

	let start = SystemTime::now();
	let tree = build_dominator_tree(2_000);
	println! {
		"Dominator tree construction time: {:?}, RAM: {}MB",
		start.elapsed().unwrap(),
		memory_stats().unwrap().virtual_mem as f32 / 1_000_000.0,
	}
	println!("Dominates(0, 1): {}", tree.dominates(0, 1));

	let start = SystemTime::now();
	let mut machine = build_machine();
	run_step_loop(&mut machine, 100_000);
	println! {
		"Step loop time: {:?}, RAM: {}MB",
		start.elapsed().unwrap(),
		memory_stats().unwrap().virtual_mem as f32 / 1_000_000.0,
	}
}
