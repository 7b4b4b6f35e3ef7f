//! Session command catalog expressed as a small grammar AST.
//!
//! The parser walks these nodes and hosts render `help` from the same table,
//! so keywords, defaults and usage strings stay in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Start,
    Reset,
    Track,
    Pose,
    Relax,
    Tick,
    Run,
    Status,
    Log,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    TrackOn,
    TrackOff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        default: Option<DefaultChoice>,
    },
    /// Optional help topic.
    Topic { next: &'static Node },
    /// Required bare identifier.
    Identifier {
        label: &'static str,
        next: &'static Node,
    },
    /// Optional unsuffixed integer.
    Count { next: &'static Node },
    /// Required duration literal (`250ms`, `2s`).
    Duration { next: &'static Node },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultChoice {
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

const END: Node = Node::End;

const TRACK_CHOICES: [ChoiceBranch; 2] = [
    ChoiceBranch {
        keyword: "on",
        tag: ChoiceTag::TrackOn,
        next: &END,
    },
    ChoiceBranch {
        keyword: "off",
        tag: ChoiceTag::TrackOff,
        next: &END,
    },
];

const TRACK_GRAMMAR: Node = Node::OptionalChoice {
    choices: &TRACK_CHOICES,
    default: Some(DefaultChoice {
        tag: ChoiceTag::TrackOn,
        next: &END,
    }),
};

const POSE_GRAMMAR: Node = Node::Identifier {
    label: "pose name",
    next: &END,
};

const TICK_GRAMMAR: Node = Node::Count { next: &END };

const RUN_GRAMMAR: Node = Node::Duration { next: &END };

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 10] = [
    CommandSpec {
        name: "start",
        tag: CommandTag::Start,
        grammar: &END,
        usage: "start",
        summary: "start the pose sequence from the first pose",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        grammar: &END,
        usage: "reset",
        summary: "return to waiting for start",
    },
    CommandSpec {
        name: "track",
        tag: CommandTag::Track,
        grammar: &TRACK_GRAMMAR,
        usage: "track [on|off]",
        summary: "set whether a full body is tracked",
    },
    CommandSpec {
        name: "pose",
        tag: CommandTag::Pose,
        grammar: &POSE_GRAMMAR,
        usage: "pose <NAME>",
        summary: "strike a pose from the library",
    },
    CommandSpec {
        name: "relax",
        tag: CommandTag::Relax,
        grammar: &END,
        usage: "relax",
        summary: "stop matching any pose",
    },
    CommandSpec {
        name: "tick",
        tag: CommandTag::Tick,
        grammar: &TICK_GRAMMAR,
        usage: "tick [count]",
        summary: "advance one or more frames",
    },
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        grammar: &RUN_GRAMMAR,
        usage: "run <duration>",
        summary: "advance frames covering a duration (ms or s)",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "show sequence and scene state",
    },
    CommandSpec {
        name: "log",
        tag: CommandTag::Log,
        grammar: &END,
        usage: "log",
        summary: "show recently published triggers",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
