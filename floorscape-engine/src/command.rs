use std::collections::HashMap;

use floorscape_core::geometry::Point2;
use floorscape_core::plan::{FloorId, Zone, ZoneKind, ZonePatch};

use crate::session::EditorSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// 解析脚本中的一行：空行与 `#` 注释返回 `None`。
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut parts = line.split_whitespace();
        let name = parts.next()?.to_string();
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn usage(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut EditorSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddZoneCommand);
        bus.register(UpdateZoneCommand);
        bus.register(RemoveZoneCommand);
        bus.register(AssignDeviceCommand);
        bus.register(MoveDeviceCommand);
        bus.register(RemoveDeviceCommand);
        bus.register(SelectFloorCommand);
        bus.register(SelectZoneCommand);
        bus.register(ZoomCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }

    pub fn usage(&self, name: &str) -> Option<&'static str> {
        self.handlers.get(name).map(|handler| handler.usage())
    }
}

fn arg<'a>(request: &'a CommandRequest, index: usize, label: &str) -> Result<&'a str, String> {
    request
        .args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 缺少参数 {label}", request.name))
}

fn number(request: &CommandRequest, index: usize, label: &str) -> Result<f64, String> {
    let raw = arg(request, index, label)?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{label} 不是有效数字: {raw}"))
}

fn floor(request: &CommandRequest, index: usize) -> Result<FloorId, String> {
    let raw = arg(request, index, "floor")?;
    raw.parse::<i32>()
        .map(FloorId)
        .map_err(|_| format!("floor 不是有效整数: {raw}"))
}

fn respond(result: Result<CommandResponse, String>) -> CommandResponse {
    result.unwrap_or_else(CommandResponse::err)
}

struct AddZoneCommand;

impl CommandHandler for AddZoneCommand {
    fn name(&self) -> &'static str {
        "add_zone"
    }

    fn usage(&self) -> &'static str {
        "add_zone <id> <floor> <x> <y> <w> <h> [name] [type]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl AddZoneCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let id = arg(request, 0, "id")?;
        let mut zone = Zone::new(
            id,
            floor(request, 1)?,
            number(request, 2, "x")?,
            number(request, 3, "y")?,
            number(request, 4, "w")?,
            number(request, 5, "h")?,
        );
        if let Some(name) = request.args.get(6) {
            zone = zone.with_name(name.as_str());
        }
        if let Some(kind) = request.args.get(7) {
            zone = zone.with_kind(ZoneKind::parse(kind));
        }
        context
            .session
            .add_zone(zone)
            .map_err(|err| err.to_string())?;
        Ok(CommandResponse::ok(format!("已添加区域 {id}")))
    }
}

struct UpdateZoneCommand;

impl CommandHandler for UpdateZoneCommand {
    fn name(&self) -> &'static str {
        "update_zone"
    }

    fn usage(&self) -> &'static str {
        "update_zone <id> key=value... (name, type, x, y, w, h, floor)"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl UpdateZoneCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let id = arg(request, 0, "id")?;
        let mut patch = ZonePatch::default();
        for pair in request.args.iter().skip(1) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("参数需为 key=value 形式: {pair}"))?;
            let parse_number = |value: &str| {
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| format!("{key} 不是有效数字: {value}"))
            };
            match key {
                "name" => patch.name = Some(value.to_string()),
                "type" => patch.kind = Some(ZoneKind::parse(value)),
                "x" => patch.x = Some(parse_number(value)?),
                "y" => patch.y = Some(parse_number(value)?),
                "w" => patch.w = Some(parse_number(value)?),
                "h" => patch.h = Some(parse_number(value)?),
                "floor" => {
                    let floor = value
                        .parse::<i32>()
                        .map_err(|_| format!("floor 不是有效整数: {value}"))?;
                    patch.floor = Some(FloorId(floor));
                }
                other => return Err(format!("未知字段: {other}")),
            }
        }
        if context.session.update_zone(id, &patch) {
            Ok(CommandResponse::ok(format!("已更新区域 {id}")))
        } else {
            Ok(CommandResponse::ok(format!("区域 {id} 不存在，已忽略")))
        }
    }
}

struct RemoveZoneCommand;

impl CommandHandler for RemoveZoneCommand {
    fn name(&self) -> &'static str {
        "remove_zone"
    }

    fn usage(&self) -> &'static str {
        "remove_zone <id>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl RemoveZoneCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let id = arg(request, 0, "id")?;
        let message = if context.session.remove_zone(id) {
            format!("已删除区域 {id}")
        } else {
            format!("区域 {id} 不存在，已忽略")
        };
        Ok(CommandResponse::ok(message))
    }
}

struct AssignDeviceCommand;

impl CommandHandler for AssignDeviceCommand {
    fn name(&self) -> &'static str {
        "assign_device"
    }

    fn usage(&self) -> &'static str {
        "assign_device <device> <zone> [x y]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl AssignDeviceCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let device = arg(request, 0, "device")?;
        let zone = arg(request, 1, "zone")?;
        let at = if request.args.len() >= 4 {
            Some(Point2::new(
                number(request, 2, "x")?,
                number(request, 3, "y")?,
            ))
        } else {
            None
        };
        let message = if context.session.assign_device(device, zone, at) {
            format!("设备 {device} 已放入区域 {zone}")
        } else {
            format!("区域 {zone} 不存在，已忽略")
        };
        Ok(CommandResponse::ok(message))
    }
}

struct MoveDeviceCommand;

impl CommandHandler for MoveDeviceCommand {
    fn name(&self) -> &'static str {
        "move_device"
    }

    fn usage(&self) -> &'static str {
        "move_device <device> <x> <y> [floor]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl MoveDeviceCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let device = arg(request, 0, "device")?;
        let x = number(request, 1, "x")?;
        let y = number(request, 2, "y")?;
        let floor = if request.args.len() > 3 {
            floor(request, 3)?
        } else {
            context.session.current_floor()
        };
        context.session.move_device(device, x, y, floor);
        Ok(CommandResponse::ok(format!(
            "设备 {device} 已移动到 ({x}, {y}) @ {floor}"
        )))
    }
}

struct RemoveDeviceCommand;

impl CommandHandler for RemoveDeviceCommand {
    fn name(&self) -> &'static str {
        "remove_device"
    }

    fn usage(&self) -> &'static str {
        "remove_device <device>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl RemoveDeviceCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let device = arg(request, 0, "device")?;
        let message = if context.session.remove_device(device) {
            format!("设备 {device} 已移除")
        } else {
            format!("设备 {device} 未放置，已忽略")
        };
        Ok(CommandResponse::ok(message))
    }
}

struct SelectFloorCommand;

impl CommandHandler for SelectFloorCommand {
    fn name(&self) -> &'static str {
        "select_floor"
    }

    fn usage(&self) -> &'static str {
        "select_floor <floor>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl SelectFloorCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let target = floor(request, 0)?;
        context.session.select_floor(target);
        Ok(CommandResponse::ok(format!("当前楼层: {target}")))
    }
}

struct SelectZoneCommand;

impl CommandHandler for SelectZoneCommand {
    fn name(&self) -> &'static str {
        "select_zone"
    }

    fn usage(&self) -> &'static str {
        "select_zone [id]"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match request.args.first() {
            Some(id) => {
                if context.session.select_zone(Some(id)) {
                    CommandResponse::ok(format!("已选中区域 {id}"))
                } else {
                    CommandResponse::ok(format!("区域 {id} 不在当前楼层，选择已清空"))
                }
            }
            None => {
                context.session.select_zone(None);
                CommandResponse::ok("选择已清空")
            }
        }
    }
}

struct ZoomCommand;

impl CommandHandler for ZoomCommand {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn usage(&self) -> &'static str {
        "zoom <factor>"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context))
    }
}

impl ZoomCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, String> {
        let zoom = number(request, 0, "factor")?;
        context.session.context_mut().set_zoom(zoom);
        Ok(CommandResponse::ok(format!(
            "缩放: {:.2}",
            context.session.context().view.zoom
        )))
    }
}
