//! Hand-assembled modules for the tests.
use crate::frame::FRAME_LEN;
use crate::loader::{MEMORY_EXPORT, NEXT_FRAME_EXPORT};
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, Instruction, MemArg, MemorySection, MemoryType, Module,
    TypeSection, ValType,
};

/// see [`TestModule::growable`]
pub const GROW_EXPORT: &str = "grow";

/// where [`TestModule::flipping`] keeps its call counter
const COUNTER_ADDR: i32 = 2 * FRAME_LEN as i32;

fn memarg_i32() -> MemArg {
    MemArg {
        offset: 0,
        align: 2,
        memory_index: 0,
    }
}

/// a module exporting `next_frame: () -> i32` and (usually) `memory`
pub struct TestModule {
    body: Vec<Instruction<'static>>,
    data: Vec<(i32, Vec<u8>)>,
    import: bool,
    call_import: bool,
    export_memory: bool,
    export_grow: bool,
}

impl TestModule {
    /// `next_frame` always returns `offset`
    pub fn returning(offset: i32) -> Self {
        TestModule {
            body: vec![Instruction::I32Const(offset)],
            data: Vec::new(),
            import: false,
            call_import: false,
            export_memory: true,
            export_grow: false,
        }
    }

    /// `next_frame` returns 0, then `FRAME_LEN`, then 0 again, and so on
    pub fn flipping() -> Self {
        TestModule {
            body: vec![
                // offset = (counter & 1) * FRAME_LEN
                Instruction::I32Const(COUNTER_ADDR),
                Instruction::I32Load(memarg_i32()),
                Instruction::I32Const(1),
                Instruction::I32And,
                Instruction::I32Const(FRAME_LEN as i32),
                Instruction::I32Mul,
                // counter += 1
                Instruction::I32Const(COUNTER_ADDR),
                Instruction::I32Const(COUNTER_ADDR),
                Instruction::I32Load(memarg_i32()),
                Instruction::I32Const(1),
                Instruction::I32Add,
                Instruction::I32Store(memarg_i32()),
            ],
            data: Vec::new(),
            import: false,
            call_import: false,
            export_memory: true,
            export_grow: false,
        }
    }

    /// `next_frame` traps
    pub fn trapping() -> Self {
        TestModule {
            body: vec![Instruction::Unreachable],
            data: Vec::new(),
            import: false,
            call_import: false,
            export_memory: true,
            export_grow: false,
        }
    }

    /// initialise memory at `offset` with `bytes`
    pub fn with_data(mut self, offset: i32, bytes: Vec<u8>) -> Self {
        self.data.push((offset, bytes));
        self
    }

    /// require a function import `env.tick: () -> ()`
    pub fn importing(mut self) -> Self {
        self.import = true;
        self
    }

    /// call the imported `env.tick` every time `next_frame` runs, so the host
    /// can count calls
    pub fn calling_import(mut self) -> Self {
        self.import = true;
        self.call_import = true;
        self
    }

    /// also export `grow: (pages: i32) -> i32`, a thin `memory.grow`
    pub fn growable(mut self) -> Self {
        self.export_grow = true;
        self
    }

    pub fn without_memory_export(mut self) -> Self {
        self.export_memory = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        types.ty().function([], [ValType::I32]);
        types.ty().function([], []);
        types.ty().function([ValType::I32], [ValType::I32]);
        module.section(&types);

        let mut func_index = 0;
        if self.import {
            let mut imports = ImportSection::new();
            imports.import("env", "tick", EntityType::Function(1));
            module.section(&imports);
            func_index = 1;
        }

        let mut funcs = FunctionSection::new();
        funcs.function(0);
        if self.export_grow {
            funcs.function(2);
        }
        module.section(&funcs);

        let mut mems = MemorySection::new();
        mems.memory(MemoryType {
            minimum: 1,
            maximum: None,
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        module.section(&mems);

        let mut exports = ExportSection::new();
        exports.export(NEXT_FRAME_EXPORT, ExportKind::Func, func_index);
        if self.export_memory {
            exports.export(MEMORY_EXPORT, ExportKind::Memory, 0);
        }
        if self.export_grow {
            exports.export(GROW_EXPORT, ExportKind::Func, func_index + 1);
        }
        module.section(&exports);

        let mut func = Function::new(vec![]);
        if self.call_import {
            func.instruction(&Instruction::Call(0));
        }
        for instruction in &self.body {
            func.instruction(instruction);
        }
        func.instruction(&Instruction::End);
        let mut code = CodeSection::new();
        code.function(&func);
        if self.export_grow {
            let mut grow = Function::new(vec![]);
            grow.instruction(&Instruction::LocalGet(0));
            grow.instruction(&Instruction::MemoryGrow(0));
            grow.instruction(&Instruction::End);
            code.function(&grow);
        }
        module.section(&code);

        if !self.data.is_empty() {
            let mut data = DataSection::new();
            for (offset, bytes) in &self.data {
                data.active(0, &ConstExpr::i32_const(*offset), bytes.iter().copied());
            }
            module.section(&data);
        }

        module.finish()
    }
}
