//! Wire-name resolution.
//!
//! Every name the engine writes or expects comes out of a [`NamingPipeline`]:
//! a default resolver followed by an ordered list of rules. A replacement
//! rule whose predicate holds discards everything composed before it; a
//! transform rewrites the name produced so far. Rules run in registration
//! order, so the last matching replacement wins and only transforms added
//! after it apply.
//!
//! ```ignore
//! let mut options = Options::default();
//! options
//!     .naming
//!     .members
//!     .transform_when(|name, _| name.to_uppercase(), |_, ctx| ctx.format == Format::Xml);
//! ```

use std::fmt;
use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

use crate::options::{Context, Format, Mode, Options};
use crate::reflect::{MemberDescriptor, MemberMeta, TypeDescriptor, TypeKind};

type Resolver<C> = Arc<dyn Fn(&C) -> Option<String> + Send + Sync>;
type Predicate<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;
type Transform<C> = Arc<dyn Fn(String, &C) -> String + Send + Sync>;
type NamePredicate<C> = Arc<dyn Fn(&str, &C) -> bool + Send + Sync>;

enum Rule<C> {
    Replace {
        resolver: Resolver<C>,
        predicate: Predicate<C>,
    },
    Transform {
        transform: Transform<C>,
        predicate: Option<NamePredicate<C>>,
    },
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        match self {
            Rule::Replace {
                resolver,
                predicate,
            } => Rule::Replace {
                resolver: Arc::clone(resolver),
                predicate: Arc::clone(predicate),
            },
            Rule::Transform {
                transform,
                predicate,
            } => Rule::Transform {
                transform: Arc::clone(transform),
                predicate: predicate.clone(),
            },
        }
    }
}

/// Default resolver plus ordered override rules.
pub struct NamingPipeline<C> {
    default: Resolver<C>,
    rules: Vec<Rule<C>>,
}

impl<C> Clone for NamingPipeline<C> {
    fn clone(&self) -> Self {
        Self {
            default: Arc::clone(&self.default),
            rules: self.rules.clone(),
        }
    }
}

impl<C> fmt::Debug for NamingPipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingPipeline")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl<C> NamingPipeline<C> {
    pub fn new(default: impl Fn(&C) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            default: Arc::new(default),
            rules: Vec::new(),
        }
    }

    /// Replaces the resolver for every context.
    pub fn replace(
        &mut self,
        resolver: impl Fn(&C) -> Option<String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.replace_when(resolver, |_| true)
    }

    /// Replaces the resolver for contexts matching `predicate`.
    pub fn replace_when(
        &mut self,
        resolver: impl Fn(&C) -> Option<String> + Send + Sync + 'static,
        predicate: impl Fn(&C) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.rules.push(Rule::Replace {
            resolver: Arc::new(resolver),
            predicate: Arc::new(predicate),
        });
        self
    }

    /// Rewrites the name produced by the previous stages.
    pub fn transform(
        &mut self,
        transform: impl Fn(String, &C) -> String + Send + Sync + 'static,
    ) -> &mut Self {
        self.rules.push(Rule::Transform {
            transform: Arc::new(transform),
            predicate: None,
        });
        self
    }

    /// Rewrites the previous name when `predicate(name, context)` holds.
    pub fn transform_when(
        &mut self,
        transform: impl Fn(String, &C) -> String + Send + Sync + 'static,
        predicate: impl Fn(&str, &C) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.rules.push(Rule::Transform {
            transform: Arc::new(transform),
            predicate: Some(Arc::new(predicate)),
        });
        self
    }

    pub fn resolve(&self, context: &C) -> Option<String> {
        let start = self
            .rules
            .iter()
            .rposition(|rule| match rule {
                Rule::Replace { predicate, .. } => predicate(context),
                Rule::Transform { .. } => false,
            });

        let (mut name, rest) = match start {
            Some(index) => {
                let name = match &self.rules[index] {
                    Rule::Replace { resolver, .. } => resolver(context),
                    Rule::Transform { .. } => None,
                };
                (name, &self.rules[index + 1..])
            }
            None => ((self.default)(context), &self.rules[..]),
        };

        for rule in rest {
            let Rule::Transform {
                transform,
                predicate,
            } = rule
            else {
                continue;
            };
            name = match name {
                Some(current)
                    if predicate
                        .as_ref()
                        .is_none_or(|predicate| predicate(&current, context)) =>
                {
                    Some(transform(current, context))
                }
                other => other,
            };
        }
        name
    }
}

/// Resolution context of type, member and item names.
#[derive(Clone)]
pub struct NameContext {
    pub ty: Arc<TypeDescriptor>,
    pub member: Option<Arc<MemberDescriptor>>,
    pub format: Format,
    pub mode: Mode,
    pub options: Arc<Options>,
}

impl NameContext {
    fn with_type(&self, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            ty,
            member: None,
            format: self.format,
            mode: self.mode,
            options: Arc::clone(&self.options),
        }
    }
}

/// Resolution context of enum values.
#[derive(Clone)]
pub struct EnumContext {
    pub ty: Arc<TypeDescriptor>,
    /// Variant identifier.
    pub value: &'static str,
    pub format: Format,
    pub mode: Mode,
    pub options: Arc<Options>,
}

/// The four pipelines consulted by the engine.
#[derive(Clone, Debug)]
pub struct NamingConventions {
    pub types: NamingPipeline<NameContext>,
    pub members: NamingPipeline<NameContext>,
    pub items: NamingPipeline<NameContext>,
    pub enums: NamingPipeline<EnumContext>,
}

impl Default for NamingConventions {
    fn default() -> Self {
        Self {
            types: NamingPipeline::new(default_type_name),
            members: NamingPipeline::new(default_member_name),
            items: NamingPipeline::new(default_item_name),
            enums: NamingPipeline::new(|context: &EnumContext| Some(context.value.to_string())),
        }
    }
}

impl NamingConventions {
    /// Member and type names derived from identifiers become `camelCase`.
    pub fn use_camel_case_names(&mut self) -> &mut Self {
        self.apply_case(|name| name.to_lower_camel_case())
    }

    pub fn use_snake_case_names(&mut self) -> &mut Self {
        self.apply_case(|name| name.to_snake_case())
    }

    pub fn use_pascal_case_names(&mut self) -> &mut Self {
        self.apply_case(|name| name.to_upper_camel_case())
    }

    fn apply_case(&mut self, case: fn(&str) -> String) -> &mut Self {
        self.members.transform_when(
            move |name, _| case(&name),
            |_, context: &NameContext| {
                context
                    .member
                    .as_ref()
                    .is_some_and(|member| explicit_member_name(member.meta()).is_none())
            },
        );
        self.types.transform_when(
            move |name, _| case(&name),
            |_, context: &NameContext| context.ty.meta().root_name.is_none(),
        );
        self
    }
}

impl Options {
    pub fn use_camel_case_names(mut self) -> Self {
        self.naming.use_camel_case_names();
        self
    }

    pub fn use_snake_case_names(mut self) -> Self {
        self.naming.use_snake_case_names();
        self
    }

    pub fn use_pascal_case_names(mut self) -> Self {
        self.naming.use_pascal_case_names();
        self
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|name| !name.is_empty())
}

fn explicit_member_name(meta: &MemberMeta) -> Option<&str> {
    non_empty(&meta.xml_attribute)
        .or_else(|| non_empty(&meta.rename))
        .or_else(|| non_empty(&meta.xml_element))
        .or_else(|| non_empty(&meta.xml_array))
        .or_else(|| non_empty(&meta.siblings))
}

fn default_type_name(context: &NameContext) -> Option<String> {
    let ty = context.ty.unshared();
    if let Some(root) = non_empty(&ty.meta().root_name) {
        return Some(root.to_string());
    }

    let naming = &context.options.naming.types;
    let nested = |inner: Arc<TypeDescriptor>| {
        let inner_context = context.with_type(inner);
        naming
            .resolve(&inner_context)
            .unwrap_or_else(|| inner_context.ty.name().to_string())
    };

    match ty.classify(&context.options) {
        TypeKind::Dictionary(_) => {
            if let Some(map) = ty.map() {
                return Some(format!("DictionaryOf{}", nested(map.value.resolve())));
            }
        }
        TypeKind::Enumerable(_) => {
            if let Some(item) = ty.item_type() {
                return Some(format!("ArrayOf{}", nested(item.resolve())));
            }
        }
        TypeKind::Simple | TypeKind::Object => {}
    }

    if ty.generic_args().is_empty() {
        return Some(ty.name().to_string());
    }
    let args: String = ty
        .generic_args()
        .iter()
        .map(|arg| nested(arg.resolve()))
        .collect();
    Some(format!("{}Of{}", ty.name(), args))
}

fn default_member_name(context: &NameContext) -> Option<String> {
    let member = context.member.as_ref()?;
    Some(
        explicit_member_name(member.meta())
            .unwrap_or(member.name())
            .to_string(),
    )
}

fn default_item_name(context: &NameContext) -> Option<String> {
    let member = context.member.as_ref()?;
    if !context.ty.unshared().classify(&context.options).is_enumerable() {
        return None;
    }
    let meta = member.meta();
    non_empty(&meta.item_name)
        .or_else(|| non_empty(&meta.siblings))
        .map(str::to_string)
}

impl Context {
    fn name_context(
        &self,
        ty: &Arc<TypeDescriptor>,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> NameContext {
        NameContext {
            ty: Arc::clone(ty),
            member: member.cloned(),
            format: self.format(),
            mode: self.mode(),
            options: Arc::clone(self.shared_options()),
        }
    }

    /// Wire name of a type-named node (roots, items, containers).
    pub fn type_name(&self, ty: &Arc<TypeDescriptor>) -> String {
        self.options()
            .naming
            .types
            .resolve(&self.name_context(ty, None))
            .unwrap_or_else(|| ty.name().to_string())
    }

    /// Wire name of a member holding a value of type `ty`.
    pub fn member_name(&self, member: &Arc<MemberDescriptor>, ty: &Arc<TypeDescriptor>) -> String {
        self.options()
            .naming
            .members
            .resolve(&self.name_context(ty, Some(member)))
            .unwrap_or_else(|| member.name().to_string())
    }

    /// Explicit item name of a collection member, if any.
    pub fn item_name(
        &self,
        member: &Arc<MemberDescriptor>,
        ty: &Arc<TypeDescriptor>,
    ) -> Option<String> {
        self.options()
            .naming
            .items
            .resolve(&self.name_context(ty, Some(member)))
    }

    /// Wire name of an enum variant.
    pub fn enum_name(&self, ty: &Arc<TypeDescriptor>, identifier: &'static str) -> String {
        let context = EnumContext {
            ty: Arc::clone(ty),
            value: identifier,
            format: self.format(),
            mode: self.mode(),
            options: Arc::clone(self.shared_options()),
        };
        self.options()
            .naming
            .enums
            .resolve(&context)
            .unwrap_or_else(|| identifier.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::reflect::{Dynamic, Reflect, TypeInfo, describe};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Order {
        id: i64,
        code: String,
        lines: Vec<String>,
    }

    impl Reflect for Order {
        fn type_info() -> TypeInfo {
            TypeInfo::object::<Self>("Order")
                .member("Id", |o| Some(&o.id), |o, v| o.id = v)
                .member_with(
                    "Code",
                    |o| Some(&o.code),
                    |o, v| o.code = v,
                    MemberMeta::new().rename("code-name").element("ignored"),
                )
                .member_with(
                    "Lines",
                    |o| Some(&o.lines),
                    |o, v| o.lines = v,
                    MemberMeta::new().item_name("line"),
                )
                .build()
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Page<T> {
        items: Vec<T>,
    }

    impl<T: Reflect + Clone + Default> Reflect for Page<T> {
        fn type_info() -> TypeInfo {
            TypeInfo::object::<Self>("Page")
                .generic_arg::<T>()
                .member("Items", |p| Some(&p.items), |p, v| p.items = v)
                .build()
        }
    }

    fn context(options: Options, format: Format) -> Context {
        Context::new(Arc::new(options), format, Mode::Serialize)
    }

    fn member(name: &str) -> (Arc<MemberDescriptor>, Arc<TypeDescriptor>) {
        let order = describe::<Order>();
        let member = Arc::clone(order.member(name).unwrap());
        let ty = member.declared_type();
        (member, ty)
    }

    #[test]
    fn test_type_names() {
        let ctx = context(Options::default(), Format::Xml);
        assert_eq!(ctx.type_name(&describe::<Order>()), "Order");
        assert_eq!(ctx.type_name(&describe::<Vec<i32>>()), "ArrayOfInt32");
        assert_eq!(ctx.type_name(&describe::<Vec<Vec<Order>>>()), "ArrayOfArrayOfOrder");
        assert_eq!(
            ctx.type_name(&describe::<HashMap<String, Order>>()),
            "DictionaryOfOrder"
        );
        assert_eq!(
            ctx.type_name(&describe::<BTreeMap<String, Dynamic>>()),
            "DictionaryOfObject"
        );
        assert_eq!(ctx.type_name(&describe::<Page<Order>>()), "PageOfOrder");
    }

    #[test]
    fn test_member_name_precedence() {
        let ctx = context(Options::default(), Format::Json);
        let (id, id_ty) = member("Id");
        assert_eq!(ctx.member_name(&id, &id_ty), "Id");
        let (code, code_ty) = member("Code");
        assert_eq!(ctx.member_name(&code, &code_ty), "code-name");
    }

    #[test]
    fn test_item_name_only_for_collections() {
        let ctx = context(Options::default(), Format::Xml);
        let (lines, lines_ty) = member("Lines");
        assert_eq!(ctx.item_name(&lines, &lines_ty).as_deref(), Some("line"));
        let (id, id_ty) = member("Id");
        assert_eq!(ctx.item_name(&id, &id_ty), None);
    }

    #[test]
    fn test_last_matching_replacement_wins() {
        let mut options = Options::default();
        options
            .naming
            .types
            .transform(|name, _| format!("{name}!"))
            .replace_when(|_| Some("first".into()), |_| true)
            .replace_when(|_| Some("json".into()), |c| c.format == Format::Json)
            .transform(|name, _| name.to_uppercase());

        let xml = context(options.clone(), Format::Xml);
        assert_eq!(xml.type_name(&describe::<Order>()), "FIRST");
        let json = context(options, Format::Json);
        assert_eq!(json.type_name(&describe::<Order>()), "JSON");
    }

    #[test]
    fn test_conditional_transform_sees_previous_name() {
        let mut options = Options::default();
        options.naming.members.transform_when(
            |name, _| format!("x-{name}"),
            |name, _| name.starts_with('I'),
        );
        let ctx = context(options, Format::Xml);
        let (id, id_ty) = member("Id");
        assert_eq!(ctx.member_name(&id, &id_ty), "x-Id");
        let (code, code_ty) = member("Code");
        assert_eq!(ctx.member_name(&code, &code_ty), "code-name");
    }

    #[test]
    fn test_casing_skips_explicit_names() {
        let ctx = context(Options::default().use_camel_case_names(), Format::Json);
        let (id, id_ty) = member("Id");
        assert_eq!(ctx.member_name(&id, &id_ty), "id");
        let (code, code_ty) = member("Code");
        assert_eq!(ctx.member_name(&code, &code_ty), "code-name");
        assert_eq!(ctx.type_name(&describe::<Order>()), "order");
    }

    #[test]
    fn test_enum_pipeline_override() {
        let mut options = Options::default();
        options
            .naming
            .enums
            .transform(|name, _| name.to_snake_case());
        let ctx = context(options, Format::Xml);
        assert_eq!(ctx.enum_name(&describe::<Order>(), "InProgress"), "in_progress");
    }
}
